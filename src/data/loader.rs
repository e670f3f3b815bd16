// ============================================================
// Layer 4 — CIFAR-100 Binary Loader
// ============================================================
// Reads the "binary version" of CIFAR-100 from disk.
//
// File layout (train.bin holds 50000 records, test.bin 10000):
//
//   byte 0        coarse label (0..20)   ignored
//   byte 1        fine label   (0..100)  the class we train on
//   bytes 2..3074 pixels, channel-major:
//                   1024 red   (row-major 32x32)
//                   1024 green
//                   1024 blue
//
// The pixel block is already in [channel, row, col] order, which
// is exactly the tensor layout the batcher builds, so it is kept
// as raw bytes until batching.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::data::dataset::ImageItem;
use crate::domain::error::TrainError;

pub const IMAGE_SIDE:     usize = 32;
pub const IMAGE_CHANNELS: usize = 3;
pub const IMAGE_BYTES:    usize = IMAGE_CHANNELS * IMAGE_SIDE * IMAGE_SIDE;
const LABEL_BYTES:        usize = 2;
const RECORD_BYTES:       usize = LABEL_BYTES + IMAGE_BYTES;

/// Which half of the dataset to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn file_name(&self) -> &'static str {
        match self {
            Split::Train => "train.bin",
            Split::Test  => "test.bin",
        }
    }
}

/// Parse a whole CIFAR-100 binary file held in memory.
pub fn parse_records(bytes: &[u8], num_classes: usize) -> Result<Vec<ImageItem>, TrainError> {
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(TrainError::dataset(format!(
            "file size {} is not a multiple of the {}-byte record size",
            bytes.len(),
            RECORD_BYTES
        )));
    }

    bytes
        .chunks_exact(RECORD_BYTES)
        .enumerate()
        .map(|(i, record)| {
            let label = record[1] as usize;
            if label >= num_classes {
                return Err(TrainError::dataset(format!(
                    "record {i} has label {label}, expected fewer than {num_classes} classes"
                )));
            }
            Ok(ImageItem {
                pixels: record[LABEL_BYTES..].to_vec(),
                label,
            })
        })
        .collect()
}

/// Read `{data_dir}/train.bin` or `{data_dir}/test.bin`.
pub fn load_split(data_dir: &Path, split: Split, num_classes: usize) -> Result<Vec<ImageItem>> {
    let path = data_dir.join(split.file_name());
    let bytes = fs::read(&path)
        .with_context(|| format!("Cannot read CIFAR-100 file '{}'", path.display()))?;

    let items = parse_records(&bytes, num_classes)
        .with_context(|| format!("Malformed CIFAR-100 file '{}'", path.display()))?;

    tracing::info!("Loaded {} images from '{}'", items.len(), path.display());
    Ok(items)
}
