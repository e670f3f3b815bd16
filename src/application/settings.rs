// ============================================================
// Layer 2 — Static Settings
// ============================================================
// Constants shared by the train and test commands: dataset
// normalisation statistics, the learning-rate milestones, where
// checkpoints and logs go, how long to train and how often to
// save. Defaults match the CIFAR-100 recipe; any field can be
// overridden from a JSON file passed with --settings.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Per-channel mean of the CIFAR-100 training images
pub const CIFAR100_TRAIN_MEAN: [f32; 3] = [0.507_075_16, 0.486_548_87, 0.440_917_84];
/// Per-channel standard deviation of the CIFAR-100 training images
pub const CIFAR100_TRAIN_STD:  [f32; 3] = [0.267_334_29, 0.256_438_46, 0.276_150_47];

/// strftime-style format used to name run folders
pub const DATE_FORMAT: &str = "%A_%d_%B_%Y_%Hh_%Mm_%Ss";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub train_mean:     [f32; 3],
    pub train_std:      [f32; 3],
    /// Directory holding train.bin and test.bin
    pub data_dir:       PathBuf,
    /// Root of the {net}/{timestamp}/ checkpoint tree
    pub checkpoint_dir: PathBuf,
    /// Root of the {net}/{timestamp}/ metrics tree
    pub log_dir:        PathBuf,
    pub date_format:    String,
    /// Total number of epochs in a run
    pub epochs:         usize,
    /// Post-warmup epochs at which the learning rate is multiplied by gamma
    pub milestones:     Vec<usize>,
    pub gamma:          f64,
    /// Save a regular checkpoint every N epochs
    pub save_epoch:     usize,
    pub num_workers:    usize,
    pub num_classes:    usize,
    pub seed:           u64,
    pub momentum:       f64,
    pub weight_decay:   f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            train_mean:     CIFAR100_TRAIN_MEAN,
            train_std:      CIFAR100_TRAIN_STD,
            data_dir:       PathBuf::from("data/cifar-100-binary"),
            checkpoint_dir: PathBuf::from("checkpoint"),
            log_dir:        PathBuf::from("runs"),
            date_format:    DATE_FORMAT.to_string(),
            epochs:         200,
            milestones:     vec![60, 120, 160],
            gamma:          0.2,
            save_epoch:     10,
            num_workers:    4,
            num_classes:    100,
            seed:           42,
            momentum:       0.9,
            weight_decay:   5e-4,
        }
    }
}

impl Settings {
    /// Defaults, or defaults overridden by the JSON file at `path`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            None => Self::default(),
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Cannot read settings from '{}'", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Cannot parse settings in '{}'", path.display()))?
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        if self.epochs == 0 {
            return Err(TrainError::config("epochs must be greater than 0"));
        }
        if self.save_epoch == 0 {
            return Err(TrainError::config("save_epoch must be greater than 0"));
        }
        if self.num_classes == 0 {
            return Err(TrainError::config("num_classes must be greater than 0"));
        }
        if self.train_std.iter().any(|&s| s <= 0.0) {
            return Err(TrainError::config("train_std entries must be positive"));
        }
        if self.milestones.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TrainError::config("milestones must be strictly increasing"));
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.milestones, vec![60, 120, 160]);
        assert_eq!(s.save_epoch, 10);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "epochs": 3, "checkpoint_dir": "/tmp/ckpt" }"#).unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.epochs, 3);
        assert_eq!(s.checkpoint_dir, PathBuf::from("/tmp/ckpt"));
        assert_eq!(s.milestones, vec![60, 120, 160]);
        assert_eq!(s.train_mean, CIFAR100_TRAIN_MEAN);
    }

    #[test]
    fn test_rejects_zero_save_epoch() {
        let s = Settings { save_epoch: 0, ..Settings::default() };
        assert!(matches!(s.validate(), Err(TrainError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unsorted_milestones() {
        let s = Settings { milestones: vec![60, 60, 160], ..Settings::default() };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/settings.json"))).is_err());
    }
}
