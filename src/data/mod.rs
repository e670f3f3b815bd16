// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the CIFAR-100 binary files on disk to tensor batches.
//
//   train.bin / test.bin
//       │
//       ▼
//   loader        → parses records into ImageItems
//       │
//       ▼
//   ImageDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher  → augments, normalises, stacks into tensors
//       │
//       ▼
//   provider      → Burn DataLoaders for train and test

/// Reads the CIFAR-100 binary record format
pub mod loader;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Implements Burn's Batcher trait with augmentation
pub mod batcher;

/// Builds the train and test DataLoaders
pub mod provider;
