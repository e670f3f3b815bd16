// ============================================================
// Layer 6 — Run Logger
// ============================================================
// On-disk MetricsSink. One directory per run:
//
//   {log_dir}/{net}/{timestamp}/
//     scalars.csv        tag,step,value      (every scalar)
//     histograms.jsonl   one JSON object per parameter per epoch
//     epochs.csv         epoch,train_loss,test_loss,accuracy,lr
//
// Example scalars.csv:
//   tag,step,value
//   Train/loss,1,4.612345
//   LastLayerGradients/grad_norm2_weights,1,0.183201
//   Test/Accuracy,1,0.041200
//
// Writes are buffered; the buffers are flushed by flush() and
// again when the logger is dropped, so an aborted run still
// leaves everything logged before the failure on disk.

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::{metrics::Histogram, traits::MetricsSink};

/// One row of epochs.csv
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean of the per-batch training losses
    pub train_loss: f64,
    /// Sample-weighted test loss
    pub test_loss:  f64,
    pub accuracy:   f64,
    /// Rate used for the last step of the epoch
    pub lr:         f64,
}

#[derive(Serialize)]
struct HistogramLine<'a> {
    tag:       &'a str,
    step:      usize,
    #[serde(flatten)]
    histogram: &'a Histogram,
}

pub struct RunLogger {
    dir:        PathBuf,
    scalars:    BufWriter<File>,
    histograms: BufWriter<File>,
    epochs:     BufWriter<File>,
}

impl RunLogger {
    /// Open (or reopen, when resuming) the log files in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let scalars    = open_append(&dir.join("scalars.csv"),      Some("tag,step,value"))?;
        let histograms = open_append(&dir.join("histograms.jsonl"), None)?;
        let epochs     = open_append(
            &dir.join("epochs.csv"),
            Some("epoch,train_loss,test_loss,accuracy,lr"),
        )?;

        tracing::debug!("Logging run metrics to '{}'", dir.display());
        Ok(Self { dir, scalars, histograms, epochs })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_epoch(&mut self, m: &EpochMetrics) -> Result<()> {
        writeln!(
            self.epochs,
            "{},{:.6},{:.6},{:.6},{:.8}",
            m.epoch, m.train_loss, m.test_loss, m.accuracy, m.lr,
        )?;
        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, test_loss={:.4}, accuracy={:.4}",
            m.epoch, m.train_loss, m.test_loss, m.accuracy,
        );
        Ok(())
    }
}

/// Open for appending, writing `header` only when the file is new.
fn open_append(path: &Path, header: Option<&str>) -> Result<BufWriter<File>> {
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file '{}'", path.display()))?;

    let mut writer = BufWriter::new(file);
    if let (true, Some(header)) = (is_new, header) {
        writeln!(writer, "{header}")?;
    }
    Ok(writer)
}

impl MetricsSink for RunLogger {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        writeln!(self.scalars, "{tag},{step},{value:.6}")?;
        Ok(())
    }

    fn add_histogram(&mut self, tag: &str, histogram: &Histogram, step: usize) -> Result<()> {
        let line = HistogramLine { tag, step, histogram };
        serde_json::to_writer(&mut self.histograms, &line)?;
        writeln!(self.histograms)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.scalars.flush()?;
        self.histograms.flush()?;
        self.epochs.flush()?;
        Ok(())
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        if let Err(e) = MetricsSink::flush(self) {
            tracing::warn!("Failed to flush run logs in '{}': {e:#}", self.dir.display());
        }
    }
}
