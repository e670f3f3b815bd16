// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// The failures a training or evaluation run can hit that the
// caller may want to tell apart. Everything else (I/O, recorder
// and serialisation failures) travels as anyhow::Error with
// context attached at the boundary where it happened.
//
// None of these are retried: a run either completes or aborts
// with the error text on the console.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    /// A configuration value that makes the run meaningless
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `-net` named an architecture that is not in the registry
    #[error("Unknown network '{name}'. Supported networks: {supported}")]
    UnknownNetwork { name: String, supported: String },

    /// `-resume` was given but there is no earlier run to resume
    #[error("No recent run folder was found under '{}'", .0.display())]
    NoRunFolder(PathBuf),

    /// The run folder exists but holds no weights file
    #[error("No recent weights file was found in '{}'", .0.display())]
    NoWeights(PathBuf),

    /// Warmup over zero iterations has no defined ramp
    #[error("Warmup needs at least one iteration (got total_iters = {0})")]
    InvalidWarmup(usize),

    /// Malformed or truncated dataset on disk
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Accuracy over an empty evaluation set is undefined
    #[error("Evaluation set is empty")]
    EmptyEvaluation,
}

impl TrainError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }
}
