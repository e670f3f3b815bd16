// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Loads one weights file and reports top-1 / top-5 error on the
// test split:
//
//   Step 1: build the named network (fresh weights)
//   Step 2: load -weights into it on the chosen device
//   Step 3: run the top-k evaluator in inference mode
//   Step 4: print the report, optionally write it as JSON
//
// Checkpoints are device-agnostic records, so a file trained on
// the GPU loads on the CPU backend unchanged.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::application::{settings::Settings, train_use_case::TrainConfig};
use crate::data::provider::{batches_per_epoch, build_test_loader, worker_count};
use crate::infra::checkpoint::{load_weights, read_run_config};
use crate::ml::{evaluator::evaluate_topk, models};

#[derive(Debug, Clone)]
pub struct TestConfig {
    pub net:        String,
    pub weights:    PathBuf,
    pub gpu:        bool,
    pub batch_size: usize,
    /// Write the report here as JSON
    pub report:     Option<PathBuf>,
    pub settings:   Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub net:           String,
    pub weights:       PathBuf,
    pub top1_accuracy: f64,
    pub top1_error:    f64,
    pub top5_error:    f64,
    pub correct_1:     usize,
    pub correct_5:     usize,
    pub total:         usize,
    pub parameters:    usize,
}

pub struct TestUseCase {
    config: TestConfig,
}

impl TestUseCase {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TestReport> {
        let report = if self.config.gpu {
            self.execute_on::<Wgpu>(WgpuDevice::default())?
        } else {
            self.execute_on::<NdArray>(NdArrayDevice::default())?
        };

        println!("result is as follows:");
        println!("The best accuracy is {}", report.top1_accuracy);
        println!("Top 1 err: {}", report.top1_error);
        println!("Top 5 err: {}", report.top5_error);
        println!("Parameter numbers: {}", report.parameters);

        if let Some(path) = &self.config.report {
            fs::write(path, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("Cannot write report to '{}'", path.display()))?;
            tracing::info!("Report written to '{}'", path.display());
        }
        Ok(report)
    }

    /// Evaluate on any inference backend.
    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<TestReport> {
        let cfg = &self.config;
        let s   = &cfg.settings;
        s.validate()?;
        B::seed(s.seed);

        self.check_run_config();
        let model = models::build::<B>(&cfg.net, s.num_classes, &device)?;
        let model = load_weights(model, &cfg.weights, &device)?;
        tracing::info!("Loaded '{}' into {}", cfg.weights.display(), cfg.net);

        let loader  = build_test_loader::<B>(s, cfg.batch_size, &device)?;
        let iterations = batches_per_epoch(loader.num_items(), worker_count(s), cfg.batch_size);
        let counter    = evaluate_topk(&model, &loader, s.num_classes, iterations)?;

        Ok(TestReport {
            net:           cfg.net.clone(),
            weights:       cfg.weights.clone(),
            top1_accuracy: counter.top1_accuracy(),
            top1_error:    counter.top1_error(),
            top5_error:    counter.topk_error(),
            correct_1:     counter.correct_1,
            correct_5:     counter.correct_k,
            total:         counter.total,
            parameters:    model.num_params(),
        })
    }
}

impl TestUseCase {
    /// Warn when the weights' run folder says they belong to another network.
    fn check_run_config(&self) {
        let Some(dir) = self.config.weights.parent() else { return };
        match read_run_config::<TrainConfig>(dir) {
            Ok(Some(run)) if run.net != self.config.net => tracing::warn!(
                "'{}' was trained as {} but is being tested as {}",
                self.config.weights.display(), run.net, self.config.net
            ),
            Ok(_)  => {}
            Err(e) => tracing::debug!("Ignoring run config next to the weights: {e:#}"),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::loader::IMAGE_BYTES;
    use crate::domain::checkpoint::{CheckpointRecord, CheckpointTag};
    use crate::infra::checkpoint::CheckpointManager;

    #[test]
    fn test_reports_errors_for_saved_weights() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        fs::create_dir_all(&data).unwrap();

        let mut bytes = Vec::new();
        for i in 0..5u8 {
            bytes.extend([0, i % 4]);
            bytes.extend(std::iter::repeat(i * 40).take(IMAGE_BYTES));
        }
        fs::write(data.join("test.bin"), bytes).unwrap();

        let settings = Settings {
            data_dir:    data,
            num_classes: 4,
            num_workers: 1,
            ..Settings::default()
        };

        let device = Default::default();
        let model  = models::build::<NdArray>("simplecnn", 4, &device).unwrap();
        let ckpt   = CheckpointManager::new(root.path().join("run")).unwrap();
        let path   = ckpt
            .save(&model, &CheckpointRecord::new("simplecnn", 1, CheckpointTag::Best))
            .unwrap();

        let report_path = root.path().join("report.json");
        let report = TestUseCase::new(TestConfig {
            net:        "simplecnn".into(),
            weights:    path,
            gpu:        false,
            batch_size: 2,
            report:     Some(report_path.clone()),
            settings,
        })
        .execute()
        .unwrap();

        assert_eq!(report.total, 5);
        // four classes, top-5 always contains the label
        assert_eq!(report.correct_5, 5);
        assert_eq!(report.top5_error, 0.0);
        assert_eq!(report.top1_error + report.top1_accuracy, 1.0);
        assert_eq!(report.parameters, model.num_params());

        let written: TestReport =
            serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(written, report);
    }

    #[test]
    fn test_missing_weights_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let result = TestUseCase::new(TestConfig {
            net:        "simplecnn".into(),
            weights:    root.path().join("nope-1-best.mpk.gz"),
            gpu:        false,
            batch_size: 2,
            report:     None,
            settings:   Settings { num_classes: 4, ..Settings::default() },
        })
        .execute_on::<NdArray>(Default::default());
        assert!(result.is_err());
    }
}
