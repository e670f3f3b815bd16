// ============================================================
// Layer 5 — ResNet (basic blocks, CIFAR stem)
// ============================================================
// 32x32 inputs are too small for the ImageNet 7x7/stride-2 stem
// plus max-pool, so the stem is a single 3x3 convolution and the
// four stages downsample with stride-2 convolutions instead.
//
//   stem     3 → 64            32x32
//   stage 1  64,  n[0] blocks  32x32
//   stage 2  128, n[1] blocks  16x16
//   stage 3  256, n[2] blocks  8x8
//   stage 4  512, n[3] blocks  4x4
//   global average pool → fc 512 → num_classes
//
// Block counts: resnet18 = [2, 2, 2, 2], resnet34 = [3, 4, 6, 3].

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use super::{blocks::ConvNorm, ImageClassifier};

pub const RESNET18: [usize; 4] = [2, 2, 2, 2];
pub const RESNET34: [usize; 4] = [3, 4, 6, 3];

const STAGE_WIDTHS: [usize; 4] = [64, 128, 256, 512];

// ─── Basic block ──────────────────────────────────────────────────────────────

/// Two 3x3 convolutions plus an identity (or 1x1 projection) shortcut.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1:    ConvNorm<B>,
    conv2:    ConvNorm<B>,
    /// Present when the block changes resolution or width
    shortcut: Option<ConvNorm<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let shortcut = (stride != 1 || in_channels != out_channels)
            .then(|| ConvNorm::new([in_channels, out_channels], 1, stride, device));
        Self {
            conv1: ConvNorm::new([in_channels, out_channels], 3, stride, device),
            conv2: ConvNorm::new([out_channels, out_channels], 3, 1, device),
            shortcut,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = match &self.shortcut {
            Some(projection) => projection.forward(x.clone()),
            None             => x.clone(),
        };
        let out = self.conv2.forward(self.conv1.forward_relu(x));
        relu(out + residual)
    }
}

// ─── Network ──────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    stem:   ConvNorm<B>,
    blocks: Vec<BasicBlock<B>>,
    gap:    AdaptiveAvgPool2d,
    fc:     Linear<B>,
}

impl<B: Backend> ResNet<B> {
    pub fn new(depth: [usize; 4], num_classes: usize, device: &B::Device) -> Self {
        let mut in_channels = 64;
        let mut blocks = Vec::with_capacity(depth.iter().sum());

        for (stage, (&count, &width)) in depth.iter().zip(STAGE_WIDTHS.iter()).enumerate() {
            let first_stride = if stage == 0 { 1 } else { 2 };
            for i in 0..count {
                let stride = if i == 0 { first_stride } else { 1 };
                blocks.push(BasicBlock::new(in_channels, width, stride, device));
                in_channels = width;
            }
        }

        Self {
            stem: ConvNorm::new([3, 64], 3, 1, device),
            blocks,
            gap:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc:   LinearConfig::new(in_channels, num_classes).init(device),
        }
    }
}

impl<B: Backend> ImageClassifier<B> for ResNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward_relu(images);
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        let x = self.gap.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }

    fn head(&self) -> &Linear<B> {
        &self.fc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_projection_only_where_shape_changes() {
        let device = Default::default();
        let net = ResNet::<NdArray>::new(RESNET18, 10, &device);
        let projected: Vec<bool> = net.blocks.iter().map(|b| b.shortcut.is_some()).collect();
        assert_eq!(projected, vec![false, false, true, false, true, false, true, false]);
    }
}
