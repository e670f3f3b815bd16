// ============================================================
// Layer 3 — Metric Value Types
// ============================================================
// Plain accumulators used by the training and evaluation loops.
// No tensors here: the ML layer copies predictions and labels
// to the host and feeds these types with ordinary integers and
// floats, so every counting rule is testable without a device.

use serde::{Deserialize, Serialize};

// ─── Top-k accounting ─────────────────────────────────────────────────────────

/// Accumulates top-1 and top-k hits over an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKCounter {
    pub correct_1: usize,
    pub correct_k: usize,
    pub total:     usize,
}

impl TopKCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one example. `ranked` holds class indices in
    /// descending score order (rank 0 is the arg-max).
    pub fn record(&mut self, ranked: &[usize], label: usize) {
        if ranked.first() == Some(&label) {
            self.correct_1 += 1;
        }
        if ranked.contains(&label) {
            self.correct_k += 1;
        }
        self.total += 1;
    }

    /// Record a whole batch. `ranked` is row-major, `k` entries per example.
    pub fn record_batch(&mut self, ranked: &[usize], k: usize, labels: &[usize]) {
        for (row, &label) in ranked.chunks(k.max(1)).zip(labels) {
            self.record(row, label);
        }
    }

    pub fn top1_accuracy(&self) -> f64 {
        ratio(self.correct_1, self.total)
    }

    pub fn topk_accuracy(&self) -> f64 {
        ratio(self.correct_k, self.total)
    }

    pub fn top1_error(&self) -> f64 {
        1.0 - self.top1_accuracy()
    }

    pub fn topk_error(&self) -> f64 {
        1.0 - self.topk_accuracy()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

// ─── Accuracy history ─────────────────────────────────────────────────────────

/// Per-epoch test accuracy, in the order the epochs ran.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyHistory {
    points: Vec<(usize, f64)>,
}

impl AccuracyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, epoch: usize, accuracy: f64) {
        self.points.push((epoch, accuracy));
    }

    pub fn points(&self) -> &[(usize, f64)] {
        &self.points
    }

    /// Highest accuracy recorded and the epoch it came from
    pub fn best(&self) -> Option<(usize, f64)> {
        self.points
            .iter()
            .copied()
            .fold(None, |best, p| match best {
                Some((_, acc)) if acc >= p.1 => best,
                _ => Some(p),
            })
    }
}

// ─── Histogram ────────────────────────────────────────────────────────────────

/// Summary of a parameter tensor's values for the logging sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub count:   usize,
    pub min:     f64,
    pub max:     f64,
    pub mean:    f64,
    pub std:     f64,
    /// Equal-width bucket counts spanning [min, max]
    pub buckets: Vec<u64>,
}

impl Histogram {
    pub fn from_values(values: &[f32], num_buckets: usize) -> Self {
        let num_buckets = num_buckets.max(1);
        if values.is_empty() {
            return Self {
                count: 0, min: 0.0, max: 0.0, mean: 0.0, std: 0.0,
                buckets: vec![0; num_buckets],
            };
        }

        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0f64);
        for &v in values {
            let v = v as f64;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let count = values.len();
        let mean  = sum / count as f64;
        let var   = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>() / count as f64;

        let mut buckets = vec![0u64; num_buckets];
        let width = (max - min) / num_buckets as f64;
        for &v in values {
            let idx = if width > 0.0 {
                (((v as f64 - min) / width) as usize).min(num_buckets - 1)
            } else {
                0
            };
            buckets[idx] += 1;
        }

        Self { count, min, max, mean, std: var.sqrt(), buckets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_correct_predictions() {
        // 10000 examples in batches of 16, label always ranked first
        let mut counter = TopKCounter::new();
        let labels: Vec<usize> = (0..10_000).map(|i| i % 100).collect();
        for batch in labels.chunks(16) {
            let ranked: Vec<usize> = batch
                .iter()
                .flat_map(|&l| [l, (l + 1) % 100, (l + 2) % 100, (l + 3) % 100, (l + 4) % 100])
                .collect();
            counter.record_batch(&ranked, 5, batch);
        }
        assert_eq!(counter.correct_1, 10_000);
        assert_eq!(counter.correct_k, 10_000);
        assert_eq!(counter.total,     10_000);
        assert_eq!(counter.top1_error(), 0.0);
        assert_eq!(counter.topk_error(), 0.0);
    }

    #[test]
    fn test_label_outside_top5_counts_nothing() {
        let mut counter = TopKCounter::new();
        let ranked = vec![
            1, 2, 3, 4, 5,
            6, 7, 8, 9, 10,
        ];
        counter.record_batch(&ranked, 5, &[0, 0]);
        assert_eq!(counter.correct_1, 0);
        assert_eq!(counter.correct_k, 0);
        assert_eq!(counter.total,     2);
        assert_eq!(counter.top1_error(), 1.0);
    }

    #[test]
    fn test_top5_hit_without_top1_hit() {
        let mut counter = TopKCounter::new();
        counter.record(&[3, 9, 4, 1, 0], 4);
        assert_eq!(counter.correct_1, 0);
        assert_eq!(counter.correct_k, 1);
    }

    #[test]
    fn test_error_and_rate_sum_to_one() {
        for total in [1usize, 3, 7, 10, 999, 10_000] {
            for correct in [0, total / 3, total / 2, total] {
                let counter = TopKCounter { correct_1: correct, correct_k: correct, total };
                assert_eq!(counter.top1_error() + counter.top1_accuracy(), 1.0);
            }
        }
    }

    #[test]
    fn test_history_best_prefers_earliest_tie() {
        let mut h = AccuracyHistory::new();
        h.push(1, 0.2);
        h.push(2, 0.5);
        h.push(3, 0.5);
        h.push(4, 0.4);
        assert_eq!(h.best(), Some((2, 0.5)));
        assert_eq!(h.points().len(), 4);
    }

    #[test]
    fn test_histogram_buckets() {
        let values = [0.0f32, 0.1, 0.2, 0.9, 1.0];
        let h = Histogram::from_values(&values, 2);
        assert_eq!(h.count, 5);
        assert_eq!(h.buckets, vec![3, 2]);
        assert_eq!(h.min, 0.0);
        assert_eq!(h.max, 1.0);
    }

    #[test]
    fn test_histogram_constant_values() {
        let h = Histogram::from_values(&[0.5f32; 8], 4);
        assert_eq!(h.buckets, vec![8, 0, 0, 0]);
        assert_eq!(h.std, 0.0);
    }
}
