// ============================================================
// Layer 5 — Parameter Inspection
// ============================================================
// Read-only views of the model used for logging:
//
//   last_layer_grad_norms  L2 norm of the classifier head's
//                          weight and bias gradients, read
//                          before the optimiser consumes them
//   parameter_histograms   value distribution of every float
//                          parameter, tagged params/{index}_{shape}

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::metrics::Histogram;
use crate::ml::models::ImageClassifier;

pub const HISTOGRAM_BUCKETS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadGradNorms {
    pub weight: f64,
    pub bias:   f64,
}

/// Gradient norms of the final layer. A parameter without a
/// gradient (no bias, or detached) reports 0.
pub fn last_layer_grad_norms<B, M>(model: &M, grads: &B::Gradients) -> HeadGradNorms
where
    B: AutodiffBackend,
    M: ImageClassifier<B>,
{
    let head   = model.head();
    let weight = head.weight.val().grad(grads).map(l2_norm).unwrap_or(0.0);
    let bias   = head
        .bias
        .as_ref()
        .and_then(|b| b.val().grad(grads))
        .map(l2_norm)
        .unwrap_or(0.0);
    HeadGradNorms { weight, bias }
}

fn l2_norm<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f64 {
    tensor.powf_scalar(2.0).sum().sqrt().into_scalar().elem::<f64>()
}

// ─── Histograms ───────────────────────────────────────────────────────────────

struct HistogramCollector {
    entries: Vec<(String, Histogram)>,
}

impl<B: Backend> ModuleVisitor<B> for HistogramCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        let shape = tensor
            .dims()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        let tag    = format!("params/{:03}_{}", self.entries.len(), shape);
        let values = tensor.to_data().iter::<f32>().collect::<Vec<f32>>();
        self.entries.push((tag, Histogram::from_values(&values, HISTOGRAM_BUCKETS)));
    }
}

/// One histogram per float parameter, in module traversal order.
pub fn parameter_histograms<B: Backend, M: Module<B>>(model: &M) -> Vec<(String, Histogram)> {
    let mut collector = HistogramCollector { entries: Vec::new() };
    model.visit(&mut collector);
    collector.entries
}
