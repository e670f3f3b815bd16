// ============================================================
// Layer 5 — Model Factory
// ============================================================
// Maps the `-net` name to a concrete architecture. The registry
// is a plain table so the CLI can list what is supported and an
// unknown name fails before any data is read.
//
//   name       architecture
//   simplecnn  two conv stages + linear head
//   vgg11..19  batch-norm VGG, 4096-wide classifier
//   resnet18   basic blocks [2, 2, 2, 2]
//   resnet34   basic blocks [3, 4, 6, 3]
//
// Every architecture implements ImageClassifier; Network is the
// Module enum the training loop, optimiser and recorder work on.

pub mod blocks;
pub mod resnet;
pub mod simple_cnn;
pub mod vgg;

use burn::{nn::Linear, prelude::*};

use crate::domain::error::TrainError;

pub use resnet::ResNet;
pub use simple_cnn::SimpleCnn;
pub use vgg::Vgg;

// ─── ImageClassifier ──────────────────────────────────────────────────────────
/// A network mapping `[batch, 3, H, W]` images to `[batch, classes]` logits.
pub trait ImageClassifier<B: Backend> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// The final fully-connected layer, whose gradients are logged
    fn head(&self) -> &Linear<B>;
}

// ─── Network ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    SimpleCnn(SimpleCnn<B>),
    Vgg(Vgg<B>),
    ResNet(ResNet<B>),
}

impl<B: Backend> ImageClassifier<B> for Network<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Self::SimpleCnn(net) => net.forward(images),
            Self::Vgg(net)       => net.forward(images),
            Self::ResNet(net)    => net.forward(images),
        }
    }

    fn head(&self) -> &Linear<B> {
        match self {
            Self::SimpleCnn(net) => net.head(),
            Self::Vgg(net)       => net.head(),
            Self::ResNet(net)    => net.head(),
        }
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    SimpleCnn,
    Vgg(vgg::VggStages),
    ResNet([usize; 4]),
}

pub const REGISTRY: &[(&str, Architecture)] = &[
    ("simplecnn", Architecture::SimpleCnn),
    ("vgg11",     Architecture::Vgg(vgg::VGG11)),
    ("vgg13",     Architecture::Vgg(vgg::VGG13)),
    ("vgg16",     Architecture::Vgg(vgg::VGG16)),
    ("vgg19",     Architecture::Vgg(vgg::VGG19)),
    ("resnet18",  Architecture::ResNet(resnet::RESNET18)),
    ("resnet34",  Architecture::ResNet(resnet::RESNET34)),
];

pub fn supported_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Resolve a `-net` name.
pub fn lookup(name: &str) -> Result<Architecture, TrainError> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, arch)| *arch)
        .ok_or_else(|| TrainError::UnknownNetwork {
            name:      name.to_string(),
            supported: supported_names().join(", "),
        })
}

impl Architecture {
    /// Freshly initialised weights on `device`
    pub fn init<B: Backend>(&self, num_classes: usize, device: &B::Device) -> Network<B> {
        match *self {
            Self::SimpleCnn      => Network::SimpleCnn(SimpleCnn::new(num_classes, device)),
            Self::Vgg(stages)    => Network::Vgg(Vgg::new(stages, num_classes, device)),
            Self::ResNet(depth)  => Network::ResNet(ResNet::new(depth, num_classes, device)),
        }
    }
}

/// Look up `name` and build it in one go.
pub fn build<B: Backend>(
    name:        &str,
    num_classes: usize,
    device:      &B::Device,
) -> Result<Network<B>, TrainError> {
    let arch  = lookup(name)?;
    let model = arch.init(num_classes, device);
    tracing::info!("Built {} ({} parameters)", name, model.num_params());
    Ok(model)
}
