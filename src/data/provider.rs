// ============================================================
// Layer 4 — Data Provider
// ============================================================
// Builds the two loaders the run driver consumes:
//
//   train   shuffled with the run seed, augmented, batch -b
//   test    not shuffled, not augmented
//
// Both read the whole split into memory once; CIFAR-100 is
// small enough (~150 MB decoded as bytes) for that.
//
// Burn splits the dataset into one contiguous partition per
// worker and each worker batches its own partition, so every
// partition can end in a short batch. With 4 workers the
// loader yields more than ceil(N / b) batches, and batches of
// different partitions arrive interleaved.

use anyhow::Result;
use std::sync::Arc;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::application::settings::Settings;
use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::{ImageDataset, ImageItem},
    loader::{load_split, Split},
};
use crate::domain::error::TrainError;

pub type ImageLoader<B> = Arc<dyn DataLoader<ImageBatch<B>>>;

/// Shuffled, augmented loader over `items`.
pub fn train_loader<B: Backend>(
    items:      Vec<ImageItem>,
    settings:   &Settings,
    batch_size: usize,
    device:     &B::Device,
) -> Result<ImageLoader<B>> {
    check_batch_size(batch_size)?;
    let batcher = ImageBatcher::<B>::new(device.clone(), settings.train_mean, settings.train_std)
        .with_augmentation();
    Ok(DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .shuffle(settings.seed)
        .num_workers(worker_count(settings))
        .build(ImageDataset::new(items)))
}

/// Unshuffled, un-augmented loader over `items`.
pub fn test_loader<B: Backend>(
    items:      Vec<ImageItem>,
    settings:   &Settings,
    batch_size: usize,
    device:     &B::Device,
) -> Result<ImageLoader<B>> {
    check_batch_size(batch_size)?;
    let batcher = ImageBatcher::<B>::new(device.clone(), settings.train_mean, settings.train_std);
    Ok(DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(worker_count(settings))
        .build(ImageDataset::new(items)))
}

/// Workers the loaders are built with
pub fn worker_count(settings: &Settings) -> usize {
    settings.num_workers.max(1)
}

/// Read train.bin from the data directory and wrap it.
pub fn build_train_loader<B: Backend>(
    settings:   &Settings,
    batch_size: usize,
    device:     &B::Device,
) -> Result<ImageLoader<B>> {
    let items = load_split(&settings.data_dir, Split::Train, settings.num_classes)?;
    train_loader(items, settings, batch_size, device)
}

/// Read test.bin from the data directory and wrap it.
pub fn build_test_loader<B: Backend>(
    settings:   &Settings,
    batch_size: usize,
    device:     &B::Device,
) -> Result<ImageLoader<B>> {
    let items = load_split(&settings.data_dir, Split::Test, settings.num_classes)?;
    test_loader(items, settings, batch_size, device)
}

/// Number of batches one pass over a loader of `num_items` yields
/// when built with `workers` workers.
///
/// Mirrors burn's partitioning: `num_items / workers` items per
/// worker, the last worker also taking the remainder.
pub fn batches_per_epoch(num_items: usize, workers: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    let workers = workers.max(1);
    let part    = num_items / workers;
    let last    = num_items - part * (workers - 1);
    part.div_ceil(batch_size) * (workers - 1) + last.div_ceil(batch_size)
}

fn check_batch_size(batch_size: usize) -> Result<(), TrainError> {
    if batch_size == 0 {
        return Err(TrainError::config("batch size must be greater than 0"));
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::data::loader::IMAGE_BYTES;

    fn items(n: usize) -> Vec<ImageItem> {
        (0..n)
            .map(|i| ImageItem { pixels: vec![(i % 256) as u8; IMAGE_BYTES], label: i % 10 })
            .collect()
    }

    #[test]
    fn test_test_loader_keeps_order_and_remainder() {
        let device   = Default::default();
        let settings = Settings { num_workers: 1, ..Settings::default() };
        let loader   = test_loader::<NdArray>(items(10), &settings, 4, &device).unwrap();

        let sizes: Vec<usize> = loader.iter().map(|b| b.images.dims()[0]).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches_per_epoch(loader.num_items(), 1, 4), 3);

        let labels: Vec<i64> = loader
            .iter()
            .flat_map(|b| b.targets.into_data().iter::<i64>().collect::<Vec<_>>())
            .collect();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_train_loader_sees_every_item() {
        let device   = Default::default();
        let settings = Settings { num_workers: 1, ..Settings::default() };
        let loader   = train_loader::<NdArray>(items(9), &settings, 4, &device).unwrap();
        let total: usize = loader.iter().map(|b| b.targets.dims()[0]).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn test_batch_count_follows_worker_partitions() {
        let device   = Default::default();
        let settings = Settings::default();
        assert_eq!(worker_count(&settings), 4);

        for (n, b) in [(8, 4), (10, 4), (9, 2), (50, 7)] {
            let loader = train_loader::<NdArray>(items(n), &settings, b, &device).unwrap();
            let sizes: Vec<usize> = loader.iter().map(|batch| batch.targets.dims()[0]).collect();
            assert_eq!(sizes.len(), batches_per_epoch(n, 4, b), "{n} items, batch {b}");
            assert_eq!(sizes.iter().sum::<usize>(), n);
        }
    }

    #[test]
    fn test_batches_per_epoch_counts_short_partition_batches() {
        // 8 items over 4 workers: four partitions of 2
        assert_eq!(batches_per_epoch(8, 4, 4), 4);
        // CIFAR-100 train split at -b 128
        assert_eq!(batches_per_epoch(50_000, 1, 128), 391);
        assert_eq!(batches_per_epoch(50_000, 4, 128), 392);
        // fewer items than workers: the last worker takes them all
        assert_eq!(batches_per_epoch(3, 4, 4), 1);
        assert_eq!(batches_per_epoch(0, 4, 4), 0);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let device = Default::default();
        assert!(test_loader::<NdArray>(items(1), &Settings::default(), 0, &device).is_err());
    }
}
