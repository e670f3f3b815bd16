// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop reports scalars and histograms to a sink it
// does not know the concrete type of. The on-disk run logger in
// Layer 6 implements it; tests use the in-memory sink below.

use anyhow::Result;
use crate::domain::metrics::Histogram;

// ─── MetricsSink ──────────────────────────────────────────────────────────────
/// Append-only time series of training metrics, keyed by tag and step.
pub trait MetricsSink {
    /// Record one scalar value for `tag` at `step`
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;

    /// Record the distribution of a parameter tensor at `step`
    fn add_histogram(&mut self, tag: &str, histogram: &Histogram, step: usize) -> Result<()>;

    /// Push buffered entries to durable storage
    fn flush(&mut self) -> Result<()>;
}

/// Sink that keeps everything in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub scalars:    Vec<(String, f64, usize)>,
    pub histograms: Vec<(String, Histogram, usize)>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values logged under `tag`, in order
    pub fn scalar_series(&self, tag: &str) -> Vec<(usize, f64)> {
        self.scalars
            .iter()
            .filter(|(t, _, _)| t == tag)
            .map(|(_, v, s)| (*s, *v))
            .collect()
    }
}

#[cfg(test)]
impl MetricsSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        self.scalars.push((tag.to_string(), value, step));
        Ok(())
    }

    fn add_histogram(&mut self, tag: &str, histogram: &Histogram, step: usize) -> Result<()> {
        self.histograms.push((tag.to_string(), histogram.clone(), step));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
