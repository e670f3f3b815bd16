// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Burn's optimisers take the learning rate as an argument on
// every step, so the schedule is plain arithmetic held here and
// consulted by the training loop before each update.
//
//   epochs 1..=warm   linear warmup, stepped once per iteration
//   epochs > warm     milestone decay, stepped once per epoch
//
// The decay counts post-warmup epochs: with warm = 1 and a
// milestone at 60 the first decay applies from epoch 61.

use crate::domain::error::TrainError;

// ─── Warmup ───────────────────────────────────────────────────────────────────

/// Linear ramp from 0 to `base_lr` over `total_iters` iterations.
#[derive(Debug, Clone)]
pub struct WarmupLr {
    base_lr:     f64,
    total_iters: usize,
    iteration:   usize,
}

impl WarmupLr {
    pub fn new(base_lr: f64, total_iters: usize) -> Result<Self, TrainError> {
        if total_iters == 0 {
            return Err(TrainError::InvalidWarmup(total_iters));
        }
        Ok(Self { base_lr, total_iters, iteration: 0 })
    }

    /// Learning rate after the steps taken so far
    pub fn current(&self) -> f64 {
        self.base_lr * self.iteration as f64 / self.total_iters as f64
    }

    /// Advance one iteration and return the new rate. Stays at
    /// the base rate once all warmup iterations are taken.
    pub fn step(&mut self) -> f64 {
        self.iteration = (self.iteration + 1).min(self.total_iters);
        self.current()
    }
}

// ─── Milestone decay ──────────────────────────────────────────────────────────

/// Multiplies the base rate by `gamma` once per milestone reached.
#[derive(Debug, Clone)]
pub struct MultiStepLr {
    base_lr:    f64,
    milestones: Vec<usize>,
    gamma:      f64,
}

impl MultiStepLr {
    pub fn new(base_lr: f64, milestones: Vec<usize>, gamma: f64) -> Self {
        Self { base_lr, milestones, gamma }
    }

    /// Rate after `step` scheduler steps
    pub fn lr_at(&self, step: usize) -> f64 {
        let passed = self.milestones.iter().filter(|&&m| m <= step).count();
        self.base_lr * self.gamma.powi(passed as i32)
    }
}

// ─── Combined controller ──────────────────────────────────────────────────────

/// Owns the current learning rate for the whole run.
#[derive(Debug, Clone)]
pub struct LrController {
    warm_epochs: usize,
    warmup:      Option<WarmupLr>,
    decay:       MultiStepLr,
    current:     f64,
}

impl LrController {
    /// `iters_per_epoch * warm_epochs` warmup iterations; no warmup when
    /// `warm_epochs` is 0.
    pub fn new(
        base_lr:         f64,
        warm_epochs:     usize,
        iters_per_epoch: usize,
        milestones:      Vec<usize>,
        gamma:           f64,
    ) -> Result<Self, TrainError> {
        let warmup = if warm_epochs > 0 {
            Some(WarmupLr::new(base_lr, iters_per_epoch * warm_epochs)?)
        } else {
            None
        };
        let current = warmup.as_ref().map(WarmupLr::current).unwrap_or(base_lr);
        Ok(Self {
            warm_epochs,
            warmup,
            decay: MultiStepLr::new(base_lr, milestones, gamma),
            current,
        })
    }

    /// Called at the top of every epoch, including skipped ones.
    pub fn begin_epoch(&mut self, epoch: usize) {
        if epoch > self.warm_epochs {
            self.current = self.decay.lr_at(epoch - self.warm_epochs);
        }
    }

    /// Called after every optimiser step.
    pub fn after_iteration(&mut self, epoch: usize) {
        if epoch <= self.warm_epochs {
            if let Some(warmup) = self.warmup.as_mut() {
                self.current = warmup.step();
            }
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}
