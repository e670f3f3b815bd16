// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks N raw images into one
// [N, 3, 32, 32] float tensor plus an [N] label tensor.
//
// Per pixel:  value = (byte / 255 - mean[c]) / std[c]
//
// Training batches are augmented first, per image:
//   random crop   pad 4 zero pixels on every side, cut a 32x32
//                 window at a random offset
//   random flip   mirror left-right with probability 0.5
//
// Both are expressed as a source-coordinate mapping, so no
// padded copy of the image is ever built.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use rand::Rng;

use crate::data::dataset::ImageItem;
use crate::data::loader::{IMAGE_BYTES, IMAGE_CHANNELS, IMAGE_SIDE};

pub const CROP_PADDING: isize = 4;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Normalised images — shape: [batch_size, 3, 32, 32]
    pub images:  Tensor<B, 4>,

    /// Class indices — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

// ─── Augmentation ─────────────────────────────────────────────────────────────
/// Where each output pixel is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    /// Crop offset relative to the unpadded image, in -4..=4
    pub dx:   isize,
    pub dy:   isize,
    pub flip: bool,
}

impl View {
    pub const IDENTITY: View = View { dx: 0, dy: 0, flip: false };

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            dx:   rng.gen_range(-CROP_PADDING..=CROP_PADDING),
            dy:   rng.gen_range(-CROP_PADDING..=CROP_PADDING),
            flip: rng.gen_bool(0.5),
        }
    }
}

/// Append one normalised image to `out` in [channel, row, col] order.
pub fn write_normalised(
    pixels: &[u8],
    view:   View,
    mean:   &[f32; 3],
    std:    &[f32; 3],
    out:    &mut Vec<f32>,
) {
    let side = IMAGE_SIDE as isize;
    for c in 0..IMAGE_CHANNELS {
        let plane = &pixels[c * IMAGE_SIDE * IMAGE_SIDE..(c + 1) * IMAGE_SIDE * IMAGE_SIDE];
        for y in 0..side {
            for x in 0..side {
                let col = if view.flip { side - 1 - x } else { x };
                let (sy, sx) = (y + view.dy, col + view.dx);
                // Padding is black, which still gets normalised
                let byte = if (0..side).contains(&sy) && (0..side).contains(&sx) {
                    plane[(sy * side + sx) as usize]
                } else {
                    0
                };
                out.push((byte as f32 / 255.0 - mean[c]) / std[c]);
            }
        }
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device:  B::Device,
    mean:    [f32; 3],
    std:     [f32; 3],
    augment: bool,
}

impl<B: Backend> ImageBatcher<B> {
    /// Batcher without augmentation (evaluation)
    pub fn new(device: B::Device, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self { device, mean, std, augment: false }
    }

    /// Enable random crop + flip (training)
    pub fn with_augmentation(mut self) -> Self {
        self.augment = true;
        self
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();
        let mut rng    = rand::thread_rng();

        let mut values = Vec::with_capacity(batch_size * IMAGE_BYTES);
        for item in &items {
            let view = if self.augment { View::random(&mut rng) } else { View::IDENTITY };
            write_normalised(&item.pixels, view, &self.mean, &self.std, &mut values);
        }

        let labels: Vec<i32> = items.iter().map(|item| item.label as i32).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(values, [batch_size, IMAGE_CHANNELS, IMAGE_SIDE, IMAGE_SIDE]),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
    const STD:  [f32; 3] = [0.5, 0.5, 0.5];

    fn gradient_image() -> Vec<u8> {
        // red plane: value = column index, other planes 255
        let mut px = vec![255u8; IMAGE_BYTES];
        for y in 0..IMAGE_SIDE {
            for x in 0..IMAGE_SIDE {
                px[y * IMAGE_SIDE + x] = x as u8;
            }
        }
        px
    }

    #[test]
    fn test_identity_view_normalises() {
        let mut out = Vec::new();
        write_normalised(&[255u8; IMAGE_BYTES], View::IDENTITY, &MEAN, &STD, &mut out);
        assert_eq!(out.len(), IMAGE_BYTES);
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let px = gradient_image();
        let mut out = Vec::new();
        let view = View { dx: 0, dy: 0, flip: true };
        write_normalised(&px, view, &[0.0; 3], &[1.0; 3], &mut out);
        assert_eq!(out[0],  31.0 / 255.0);
        assert_eq!(out[31], 0.0);
    }

    #[test]
    fn test_crop_shifts_and_pads_with_black() {
        let px = gradient_image();
        let mut out = Vec::new();
        let view = View { dx: -4, dy: 0, flip: false };
        write_normalised(&px, view, &[0.0; 3], &[1.0; 3], &mut out);
        // first four columns come from the padding
        assert!(out[..4].iter().all(|&v| v == 0.0));
        assert_eq!(out[4], 0.0);
        assert_eq!(out[5], 1.0 / 255.0);
        // green plane padding is black too, not the 255 of the image
        assert_eq!(out[IMAGE_SIDE * IMAGE_SIDE], 0.0);
    }

    #[test]
    fn test_random_view_stays_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let v = View::random(&mut rng);
            assert!((-CROP_PADDING..=CROP_PADDING).contains(&v.dx));
            assert!((-CROP_PADDING..=CROP_PADDING).contains(&v.dy));
        }
    }

    #[test]
    fn test_batch_shapes() {
        let device  = Default::default();
        let batcher = ImageBatcher::<NdArray>::new(device, MEAN, STD).with_augmentation();
        let items   = vec![
            ImageItem { pixels: vec![0; IMAGE_BYTES], label: 4 },
            ImageItem { pixels: vec![9; IMAGE_BYTES], label: 7 },
            ImageItem { pixels: vec![0; IMAGE_BYTES], label: 1 },
        ];
        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [3, 3, 32, 32]);
        let labels: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(labels, vec![4, 7, 1]);
    }
}
