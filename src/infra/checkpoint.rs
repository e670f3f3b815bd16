// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// Saves and restores network weights with Burn's gzip'd named
// MessagePack recorder at full precision
// and finds the right file to resume from.
//
// Directory layout:
//   checkpoint/
//     vgg16/
//       Monday_03_June_2024_14h_05m_09s/   ← one folder per run
//         train_config.json
//         vgg16-1-best.mpk.gz              ← weights
//         vgg16-1-best.json                ← CheckpointRecord
//         vgg16-10-regular.mpk.gz
//         vgg16-10-regular.json
//
// The file name alone identifies a checkpoint (net, epoch, tag);
// the .json record next to it adds the accuracy it was saved at.
// Older best files are never deleted, so the best lineage is
// the best-tagged file with the highest epoch.
//
// The recorder appends its own extension, so every path
// handed to it is the stem without ".mpk.gz".

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::{
    checkpoint::{CheckpointRecord, CheckpointTag, WEIGHTS_EXTENSION},
    error::TrainError,
};
use crate::ml::models::Network;

const CONFIG_FILE: &str = "train_config.json";

/// Writes `{stem}.mpk.gz`. Full precision, so a reloaded model
/// reproduces the saved one exactly.
pub type WeightsRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

// ─── Locator ──────────────────────────────────────────────────────────────────

/// Name of the newest non-empty run folder under `root`, ordered by
/// the timestamp its name encodes. Names that do not parse with
/// `date_format` are ignored.
pub fn most_recent_folder(root: &Path, date_format: &str) -> Result<Option<String>> {
    if !root.is_dir() {
        return Ok(None);
    }

    let mut newest: Option<(NaiveDateTime, String)> = None;
    for entry in read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(stamp) = NaiveDateTime::parse_from_str(&name, date_format) else {
            tracing::debug!("Ignoring run folder '{}': not a timestamp", name);
            continue;
        };
        if fs::read_dir(entry.path())?.next().is_none() {
            tracing::debug!("Ignoring empty run folder '{}'", name);
            continue;
        }
        if newest.as_ref().map_or(true, |(best, _)| stamp > *best) {
            newest = Some((stamp, name));
        }
    }
    Ok(newest.map(|(_, name)| name))
}

/// Weights file with the highest epoch in `dir`, best or regular.
pub fn most_recent_weights(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(weight_files(dir)?
        .into_iter()
        .max_by_key(|(record, _)| record.epoch)
        .map(|(_, path)| path))
}

/// Best-tagged weights file with the highest epoch in `dir`.
pub fn best_acc_weights(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(weight_files(dir)?
        .into_iter()
        .filter(|(record, _)| record.tag == CheckpointTag::Best)
        .max_by_key(|(record, _)| record.epoch)
        .map(|(_, path)| path))
}

/// Epoch embedded in the most recent weights file.
pub fn last_epoch(dir: &Path) -> Result<usize> {
    let path = most_recent_weights(dir)?
        .ok_or_else(|| TrainError::NoWeights(dir.to_path_buf()))?;
    let record = file_record(&path).ok_or_else(|| TrainError::NoWeights(dir.to_path_buf()))?;
    Ok(record.epoch)
}

/// Parse the record a weights path encodes in its file name
pub fn file_record(path: &Path) -> Option<CheckpointRecord> {
    CheckpointRecord::parse_file_name(path.file_name()?.to_str()?)
}

fn weight_files(dir: &Path) -> Result<Vec<(CheckpointRecord, PathBuf)>> {
    let mut files = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry?.path();
        if let Some(record) = file_record(&path) {
            files.push((record, path));
        }
    }
    Ok(files)
}

fn read_dir(dir: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(dir).with_context(|| format!("Cannot list directory '{}'", dir.display()))
}

/// Strip ".mpk.gz" so the recorder does not double it
fn recorder_stem(path: &Path) -> PathBuf {
    let suffix = format!(".{WEIGHTS_EXTENSION}");
    match path.to_str().and_then(|p| p.strip_suffix(&suffix)) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

// ─── Weights I/O ──────────────────────────────────────────────────────────────

/// Load weights from `path` (with or without ".mpk.gz") into `model`.
/// The architecture must match the one that was saved.
pub fn load_weights<B: Backend>(
    model:  Network<B>,
    path:   &Path,
    device: &B::Device,
) -> Result<Network<B>> {
    let record = WeightsRecorder::new()
        .load(recorder_stem(path), device)
        .with_context(|| {
            format!(
                "Cannot load weights '{}'. Does -net match the network that was trained?",
                path.display()
            )
        })?;
    tracing::debug!("Loaded weights from '{}'", path.display());
    Ok(model.load_record(record))
}

/// Read the `.json` record saved next to a weights file, if any.
pub fn load_record(weights: &Path) -> Result<Option<CheckpointRecord>> {
    let sidecar = recorder_stem(weights).with_extension("json");
    if !sidecar.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&sidecar)
        .with_context(|| format!("Cannot read checkpoint record '{}'", sidecar.display()))?;
    let record = serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse checkpoint record '{}'", sidecar.display()))?;
    Ok(Some(record))
}

/// Read the train_config.json of the run folder `dir`, if it has one.
pub fn read_run_config<T: DeserializeOwned>(dir: &Path) -> Result<Option<T>> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
    let cfg = serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse config in '{}'", path.display()))?;
    Ok(Some(cfg))
}

// ─── CheckpointManager ────────────────────────────────────────────────────────

/// Owns one run folder: weights, records and the run's config.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Use `dir` as the run folder, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint folder '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{net}-{epoch}-{tag}.mpk.gz` and its `.json` record.
    /// Returns the weights path.
    pub fn save<B: Backend>(&self, model: &Network<B>, record: &CheckpointRecord) -> Result<PathBuf> {
        let stem = self.dir.join(record.file_stem());
        WeightsRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", stem.display()))?;

        let sidecar = self.dir.join(record.metadata_file_name());
        fs::write(&sidecar, serde_json::to_string_pretty(record)?)
            .with_context(|| format!("Cannot write checkpoint record '{}'", sidecar.display()))?;

        let path = self.dir.join(record.weights_file_name());
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }

    /// Whether the run folder already holds a train_config.json
    pub fn has_config(&self) -> bool {
        self.dir.join(CONFIG_FILE).exists()
    }

    /// Write the run's configuration to train_config.json
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn most_recent_weights(&self) -> Result<Option<PathBuf>> {
        most_recent_weights(&self.dir)
    }

    pub fn best_acc_weights(&self) -> Result<Option<PathBuf>> {
        best_acc_weights(&self.dir)
    }

    pub fn last_epoch(&self) -> Result<usize> {
        last_epoch(&self.dir)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, record::FileRecorder};
    use chrono::NaiveDate;

    use crate::application::settings::DATE_FORMAT;
    use crate::ml::models::{self, ImageClassifier};

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn stamp(day: u32, hour: u32) -> String {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .format(DATE_FORMAT)
            .to_string()
    }

    #[test]
    fn test_most_recent_weights_is_numeric() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "vgg16-2-best.mpk.gz");
        touch(dir.path(), "vgg16-10-regular.mpk.gz");
        touch(dir.path(), "vgg16-9-best.mpk.gz");
        touch(dir.path(), "vgg16-9-best.json");
        touch(dir.path(), "train_config.json");

        let recent = most_recent_weights(dir.path()).unwrap().unwrap();
        assert_eq!(recent.file_name().unwrap(), "vgg16-10-regular.mpk.gz");
        assert_eq!(last_epoch(dir.path()).unwrap(), 10);
    }

    #[test]
    fn test_best_is_highest_epoch_best_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "resnet18-5-best.mpk.gz");
        touch(dir.path(), "resnet18-12-best.mpk.gz");
        touch(dir.path(), "resnet18-20-regular.mpk.gz");

        let best = best_acc_weights(dir.path()).unwrap().unwrap();
        assert_eq!(best.file_name().unwrap(), "resnet18-12-best.mpk.gz");
    }

    #[test]
    fn test_empty_dir_has_no_weights() {
        let dir = tempfile::tempdir().unwrap();
        assert!(most_recent_weights(dir.path()).unwrap().is_none());
        assert!(best_acc_weights(dir.path()).unwrap().is_none());
        let err = last_epoch(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::NoWeights(_))));
    }

    #[test]
    fn test_most_recent_folder_skips_empty_and_unparsable() {
        let root = tempfile::tempdir().unwrap();
        let older = root.path().join(stamp(1, 9));
        let newer = root.path().join(stamp(2, 8));
        let empty = root.path().join(stamp(3, 0));
        let junk  = root.path().join("not-a-date");
        for d in [&older, &newer, &empty, &junk] {
            fs::create_dir_all(d).unwrap();
        }
        touch(&older, "a");
        touch(&newer, "a");
        touch(&junk,  "a");

        let found = most_recent_folder(root.path(), DATE_FORMAT).unwrap();
        assert_eq!(found, Some(stamp(2, 8)));
    }

    #[test]
    fn test_most_recent_folder_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let found = most_recent_folder(&root.path().join("nope"), DATE_FORMAT).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_save_then_load_gives_identical_outputs() {
        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().join("run")).unwrap();

        let trained = models::build::<NdArray>("simplecnn", 10, &device).unwrap();
        let record  = CheckpointRecord::new("simplecnn", 3, CheckpointTag::Best).with_accuracy(0.5);
        let path    = ckpt.save(&trained, &record).unwrap();
        assert!(path.exists());
        assert_eq!(load_record(&path).unwrap(), Some(record));

        let fresh    = models::build::<NdArray>("simplecnn", 10, &device).unwrap();
        let restored = load_weights(fresh, &path, &device).unwrap();

        let images = Tensor::<NdArray, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Default,
            &device,
        );
        let expected: Vec<f32> = trained.forward(images.clone()).into_data().iter::<f32>().collect();
        let actual:   Vec<f32> = restored.forward(images).into_data().iter::<f32>().collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_recorder_writes_the_located_extension() {
        assert_eq!(<WeightsRecorder as FileRecorder<NdArray>>::file_extension(), WEIGHTS_EXTENSION);

        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let model  = models::build::<NdArray>("simplecnn", 4, &device).unwrap();
        ckpt.save(&model, &CheckpointRecord::new("simplecnn", 2, CheckpointTag::Regular)).unwrap();
        let best = ckpt.save(&model, &CheckpointRecord::new("simplecnn", 1, CheckpointTag::Best)).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![
            "simplecnn-1-best.json",
            "simplecnn-1-best.mpk.gz",
            "simplecnn-2-regular.json",
            "simplecnn-2-regular.mpk.gz",
        ]);
        assert_eq!(ckpt.best_acc_weights().unwrap(), Some(best));
        assert_eq!(ckpt.last_epoch().unwrap(), 2);
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(!ckpt.has_config());
        ckpt.save_config(&vec![1usize, 2, 3]).unwrap();
        assert!(ckpt.has_config());
        let back: Option<Vec<usize>> = read_run_config(ckpt.dir()).unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
        assert!(read_run_config::<Vec<usize>>(&dir.path().join("elsewhere")).unwrap().is_none());
    }
}
