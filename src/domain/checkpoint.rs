// ============================================================
// Layer 3 — Checkpoint Record
// ============================================================
// A checkpoint is a snapshot of the model's parameters taken at
// the end of an epoch. Its metadata (network, epoch, tier) is
// encoded in the file name so older tooling can still find it:
//
//   {net}-{epoch}-{best|regular}.mpk.gz
//
// The same metadata, plus the accuracy the snapshot scored, is
// also written next to the weights as {net}-{epoch}-{tag}.json.
// File names remain the source of truth when locating files.

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Extension the weights recorder appends
pub const WEIGHTS_EXTENSION: &str = "mpk.gz";

/// Tier of a saved checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointTag {
    /// Saved because evaluation accuracy beat the best so far
    Best,
    /// Saved on the fixed every-N-epochs cadence
    Regular,
}

impl CheckpointTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best    => "best",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best"    => Ok(Self::Best),
            "regular" => Ok(Self::Regular),
            other     => Err(format!("unknown checkpoint tag '{other}'")),
        }
    }
}

/// Metadata describing one saved weights file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub net:      String,
    pub epoch:    usize,
    pub tag:      CheckpointTag,
    /// Test accuracy at the time of saving, if known
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl CheckpointRecord {
    pub fn new(net: impl Into<String>, epoch: usize, tag: CheckpointTag) -> Self {
        Self { net: net.into(), epoch, tag, accuracy: None }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// `{net}-{epoch}-{tag}` — the recorder adds the extension itself
    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.net, self.epoch, self.tag)
    }

    /// Full weights file name, extension included
    pub fn weights_file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), WEIGHTS_EXTENSION)
    }

    /// Sidecar metadata file name
    pub fn metadata_file_name(&self) -> String {
        format!("{}.json", self.file_stem())
    }

    /// Parse a weights file name back into its record.
    /// Returns None for anything that is not a weights file.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let caps  = weights_pattern().captures(name)?;
        let epoch = caps.name("epoch")?.as_str().parse::<usize>().ok()?;
        let tag   = caps.name("tag")?.as_str().parse::<CheckpointTag>().ok()?;
        Some(Self::new(caps.name("net")?.as_str(), epoch, tag))
    }
}

fn weights_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<net>.+)-(?P<epoch>[0-9]+)-(?P<tag>best|regular)\.mpk\.gz$")
            .expect("weights file pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let r = CheckpointRecord::new("resnet18", 42, CheckpointTag::Best);
        assert_eq!(r.file_stem(),          "resnet18-42-best");
        assert_eq!(r.weights_file_name(),  "resnet18-42-best.mpk.gz");
        assert_eq!(r.metadata_file_name(), "resnet18-42-best.json");
    }

    #[test]
    fn test_parse_file_name() {
        let r = CheckpointRecord::parse_file_name("vgg16-120-regular.mpk.gz").unwrap();
        assert_eq!(r.net, "vgg16");
        assert_eq!(r.epoch, 120);
        assert_eq!(r.tag, CheckpointTag::Regular);
        assert_eq!(r.accuracy, None);
    }

    #[test]
    fn test_parse_keeps_dashes_in_net_name() {
        let r = CheckpointRecord::parse_file_name("wide-resnet-7-best.mpk.gz").unwrap();
        assert_eq!(r.net, "wide-resnet");
        assert_eq!(r.epoch, 7);
    }

    #[test]
    fn test_parse_rejects_other_files() {
        assert!(CheckpointRecord::parse_file_name("train_config.json").is_none());
        assert!(CheckpointRecord::parse_file_name("vgg16-3-best.json").is_none());
        assert!(CheckpointRecord::parse_file_name("vgg16-x-best.mpk.gz").is_none());
        assert!(CheckpointRecord::parse_file_name("vgg16-3-worst.mpk.gz").is_none());
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let r = CheckpointRecord::new("vgg11", 3, CheckpointTag::Best).with_accuracy(0.61);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"tag\":\"best\""));
        let back: CheckpointRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
