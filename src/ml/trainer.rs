// ============================================================
// Layer 5 — Training and Evaluation Loops
// ============================================================
// One call to train_epoch is one pass over the training loader:
//
//   forward → cross-entropy → backward
//     → read head gradient norms (before the optimiser takes them)
//     → SGD step at the controller's current rate
//     → warmup step while epoch <= warm
//
// Global iteration index, used as the step of per-batch scalars:
//   n_iter = (epoch - 1) * per_epoch + batch_index + 1
// per_epoch must be the batch count the loader really yields
// (see data::provider::batches_per_epoch), or steps repeat
// across epochs.
//
// evaluate runs on the inner backend (model.valid()), so no
// autodiff graph is built and dropout is disabled.
//
// Burn notes:
//   - argmax(1) returns [batch, 1]; flatten before .equal()
//   - the loss of a batch is its mean, so the evaluation total
//     weights each batch by its size before dividing by N

use anyhow::Result;
use std::time::{Duration, Instant};
use burn::{
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::provider::ImageLoader;
use crate::domain::{error::TrainError, traits::MetricsSink};
use crate::ml::{
    inspect::{last_layer_grad_norms, parameter_histograms},
    models::{ImageClassifier, Network},
    scheduler::LrController,
};

// ─── Summaries ────────────────────────────────────────────────────────────────

/// What one training epoch did.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch:     usize,
    pub mean_loss: f64,
    pub batches:   usize,
    pub elapsed:   Duration,
}

/// Result of one pass over the test set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    /// Sample-weighted mean cross-entropy
    pub average_loss: f64,
    /// correct / total, in [0, 1]
    pub accuracy:     f64,
    pub correct:      usize,
    pub total:        usize,
}

// ─── Training ─────────────────────────────────────────────────────────────────

/// Train for one epoch. The model is consumed and returned
/// because Burn's optimiser step works by value.
pub fn train_epoch<B, O>(
    epoch:     usize,
    mut model: Network<B>,
    optim:     &mut O,
    loader:    &ImageLoader<B>,
    lr:        &mut LrController,
    per_epoch: usize,
    sink:      &mut dyn MetricsSink,
) -> Result<(Network<B>, EpochSummary)>
where
    B: AutodiffBackend,
    O: Optimizer<Network<B>, B>,
{
    let start         = Instant::now();
    let total_samples = loader.num_items();

    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut trained  = 0usize;

    for (batch_index, batch) in loader.iter().enumerate() {
        let batch_len = batch.targets.dims()[0];
        let ce        = CrossEntropyLossConfig::new().init(&batch.images.device());

        let logits = model.forward(batch.images);
        let loss   = ce.forward(logits, batch.targets);
        let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = loss.backward();
        let norms = last_layer_grad_norms(&model, &grads);
        let grads = GradientsParams::from_grads(grads, &model);

        let step_lr = lr.current();
        model = optim.step(step_lr, model, grads);

        let n_iter = (epoch - 1) * per_epoch + batch_index + 1;
        trained   += batch_len;
        println!(
            "Training Epoch: {epoch} [{trained}/{total_samples}]\tLoss: {loss_value:.4}\tLR: {step_lr:.6}"
        );

        sink.add_scalar("LastLayerGradients/grad_norm2_weights", norms.weight, n_iter)?;
        sink.add_scalar("LastLayerGradients/grad_norm2_bias",    norms.bias,   n_iter)?;
        sink.add_scalar("Train/loss",                            loss_value,   n_iter)?;

        lr.after_iteration(epoch);

        loss_sum += loss_value;
        batches  += 1;
    }

    for (tag, histogram) in parameter_histograms(&model) {
        sink.add_histogram(&tag, &histogram, epoch)?;
    }

    let elapsed = start.elapsed();
    println!("epoch {epoch} training time consumed: {:.2}s", elapsed.as_secs_f64());

    let mean_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
    Ok((model, EpochSummary { epoch, mean_loss, batches, elapsed }))
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

/// Average loss and top-1 accuracy over the whole loader.
/// Logs `Test/Average loss` and `Test/Accuracy` at `epoch` when a
/// sink is given.
pub fn evaluate<B: Backend>(
    model:  &Network<B>,
    loader: &ImageLoader<B>,
    epoch:  usize,
    sink:   Option<&mut dyn MetricsSink>,
) -> Result<EvalSummary> {
    let start = Instant::now();

    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut total    = 0usize;

    for batch in loader.iter() {
        let batch_len = batch.targets.dims()[0];
        let ce        = CrossEntropyLossConfig::new().init(&batch.images.device());

        let logits = model.forward(batch.images);
        let batch_loss: f64 = ce
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem::<f64>();

        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        let hits: i64 = predicted
            .equal(batch.targets)
            .int().sum().into_scalar().elem::<i64>();

        loss_sum += batch_loss * batch_len as f64;
        correct  += hits as usize;
        total    += batch_len;
    }

    if total == 0 {
        return Err(TrainError::EmptyEvaluation.into());
    }

    let summary = EvalSummary {
        average_loss: loss_sum / total as f64,
        accuracy:     correct as f64 / total as f64,
        correct,
        total,
    };

    println!("Evaluating Network.....");
    println!(
        "Test set: Epoch: {}, Average loss: {:.4}, Accuracy: {:.4}, Time consumed:{:.2}s",
        epoch, summary.average_loss, summary.accuracy, start.elapsed().as_secs_f64(),
    );

    if let Some(sink) = sink {
        sink.add_scalar("Test/Average loss", summary.average_loss, epoch)?;
        sink.add_scalar("Test/Accuracy",     summary.accuracy,     epoch)?;
    }

    Ok(summary)
}
