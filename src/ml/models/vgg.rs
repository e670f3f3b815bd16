// ============================================================
// Layer 5 — VGG (batch-norm variant)
// ============================================================
// Five convolution stages, each closed by a 2x2 max-pool, so a
// 32x32 input reaches the classifier as a 512x1x1 feature map.
//
//   stage widths   vgg11: 64 | 128 | 256 256 | 512 512 | 512 512
//                  vgg16: 64 64 | 128 128 | 256x3 | 512x3 | 512x3
//
// Classifier: 512 → 4096 → 4096 → num_classes with ReLU and
// dropout between the fully-connected layers.

use burn::{
    nn::{
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
};

use super::{blocks::ConvNorm, ImageClassifier};

/// Output channels of each convolution, grouped by stage
pub type VggStages = &'static [&'static [usize]];

pub const VGG11: VggStages = &[&[64], &[128], &[256, 256], &[512, 512], &[512, 512]];
pub const VGG13: VggStages = &[&[64, 64], &[128, 128], &[256, 256], &[512, 512], &[512, 512]];
pub const VGG16: VggStages = &[
    &[64, 64], &[128, 128], &[256, 256, 256], &[512, 512, 512], &[512, 512, 512],
];
pub const VGG19: VggStages = &[
    &[64, 64], &[128, 128], &[256, 256, 256, 256], &[512, 512, 512, 512], &[512, 512, 512, 512],
];

#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    convs: Vec<ConvNorm<B>>,
    pool:  MaxPool2d,
}

impl<B: Backend> VggStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.convs.iter().fold(x, |x, conv| conv.forward_relu(x));
        self.pool.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    stages:  Vec<VggStage<B>>,
    fc1:     Linear<B>,
    fc2:     Linear<B>,
    fc3:     Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> Vgg<B> {
    pub fn new(stages: VggStages, num_classes: usize, device: &B::Device) -> Self {
        let mut in_channels = 3;
        let stages = stages
            .iter()
            .map(|widths| {
                let convs = widths
                    .iter()
                    .map(|&out| {
                        let conv = ConvNorm::new([in_channels, out], 3, 1, device);
                        in_channels = out;
                        conv
                    })
                    .collect();
                VggStage {
                    convs,
                    pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                }
            })
            .collect();

        Self {
            stages,
            fc1:     LinearConfig::new(in_channels, 4096).init(device),
            fc2:     LinearConfig::new(4096, 4096).init(device),
            fc3:     LinearConfig::new(4096, num_classes).init(device),
            dropout: DropoutConfig::new(0.5).init(),
        }
    }
}

impl<B: Backend> ImageClassifier<B> for Vgg<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        use burn::tensor::activation::relu;

        let x = self.stages.iter().fold(images, |x, stage| stage.forward(x));
        // [batch, 512, 1, 1] → [batch, 512]
        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc1.forward(x)));
        let x = self.dropout.forward(relu(self.fc2.forward(x)));
        self.fc3.forward(x)
    }

    fn head(&self) -> &Linear<B> {
        &self.fc3
    }
}
