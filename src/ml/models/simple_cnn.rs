// Two conv stages and a linear head. Small enough to train on a
// CPU in seconds, which makes it the network used by the tests.

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
};

use super::{blocks::ConvNorm, ImageClassifier};

#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    conv1: ConvNorm<B>,
    conv2: ConvNorm<B>,
    pool:  MaxPool2d,
    gap:   AdaptiveAvgPool2d,
    fc:    Linear<B>,
}

impl<B: Backend> SimpleCnn<B> {
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv1: ConvNorm::new([3, 32], 3, 1, device),
            conv2: ConvNorm::new([32, 64], 3, 1, device),
            pool:  MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            gap:   AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc:    LinearConfig::new(64, num_classes).init(device),
        }
    }
}

impl<B: Backend> ImageClassifier<B> for SimpleCnn<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.conv1.forward_relu(images));
        let x = self.pool.forward(self.conv2.forward_relu(x));
        let x = self.gap.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }

    fn head(&self) -> &Linear<B> {
        &self.fc
    }
}
