// ============================================================
// Layer 5 — Top-k Evaluator
// ============================================================
// Runs a loaded network over the test loader and counts how
// often the true label is the highest-scoring class (top-1) or
// among the k highest (top-k, k = min(5, classes)).
//
// Scores are ranked on the device with topk_with_indices; only
// the [batch, k] index matrix is copied back to the host, where
// TopKCounter does the bookkeeping.

use anyhow::Result;
use burn::prelude::*;

use crate::data::provider::ImageLoader;
use crate::domain::{error::TrainError, metrics::TopKCounter};
use crate::ml::models::{ImageClassifier, Network};

pub const TOP_K: usize = 5;

/// `iterations` is the batch count the loader yields, shown in
/// the progress lines.
pub fn evaluate_topk<B: Backend>(
    model:       &Network<B>,
    loader:      &ImageLoader<B>,
    num_classes: usize,
    iterations:  usize,
) -> Result<TopKCounter> {
    let k           = TOP_K.min(num_classes).max(1);
    let mut counter = TopKCounter::new();

    for (n_iter, batch) in loader.iter().enumerate() {
        println!("iteration: {}\ttotal {} iterations", n_iter + 1, iterations);

        let logits     = model.forward(batch.images);
        let (_, ranks) = logits.topk_with_indices(k, 1);

        let ranked: Vec<usize> = ranks.into_data().iter::<i64>().map(|i| i as usize).collect();
        let labels: Vec<usize> = batch.targets.into_data().iter::<i64>().map(|l| l as usize).collect();
        counter.record_batch(&ranked, k, &labels);
    }

    if counter.total == 0 {
        return Err(TrainError::EmptyEvaluation.into());
    }

    tracing::debug!(
        "top-1 hits {} / top-{} hits {} / {} examples",
        counter.correct_1, k, counter.correct_k, counter.total
    );
    Ok(counter)
}
