// ============================================================
// Layer 2 — TrainUseCase (run driver)
// ============================================================
// Drives one training run through four states:
//
//   INIT         seed, model, loaders, SGD, LR controller,
//                run folder, run logger, train_config.json
//   RESUME-LOAD  (only with -resume) evaluate the newest best
//                checkpoint to recover the best accuracy so far,
//                then load the most recent checkpoint as the
//                live weights and note its epoch
//   EPOCH-LOOP   for epoch in 1..=epochs:
//                  advance the LR schedule (skipped epochs too)
//                  skip epochs already completed
//                  train → evaluate → record accuracy
//                  save "best" if strictly better, otherwise
//                  "regular" every save_epoch epochs
//   FINALIZE     flush logs, draw the accuracy chart
//
// All run state lives in RunContext and locals; nothing global.
// The run logger flushes on drop, so logs survive an error exit.

use anyhow::Result;
use std::{path::PathBuf, time::Instant};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice},
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, decay::WeightDecayConfig, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::application::settings::Settings;
use crate::data::provider::{batches_per_epoch, build_test_loader, build_train_loader, worker_count};
use crate::domain::{
    checkpoint::{CheckpointRecord, CheckpointTag},
    error::TrainError,
    metrics::AccuracyHistory,
    traits::MetricsSink,
};
use crate::infra::{
    chart::render_accuracy_chart,
    checkpoint::{load_record, load_weights, most_recent_folder, CheckpointManager},
    metrics::{EpochMetrics, RunLogger},
};
use crate::ml::{
    models,
    scheduler::LrController,
    trainer::{evaluate, train_epoch},
    CpuBackend, GpuBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one run depends on. Saved as train_config.json in
// the run folder so a checkpoint can be traced back to its run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub net:        String,
    pub gpu:        bool,
    pub batch_size: usize,
    /// Number of warmup epochs
    pub warm:       usize,
    pub lr:         f64,
    pub resume:     bool,
    /// Where the accuracy chart is written
    pub chart_dir:  PathBuf,
    pub settings:   Settings,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            net:        "resnet18".to_string(),
            gpu:        false,
            batch_size: 128,
            warm:       1,
            lr:         0.1,
            resume:     false,
            chart_dir:  PathBuf::from("."),
            settings:   Settings::default(),
        }
    }
}

// ─── Checkpoint policy ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    Best,
    Regular,
    Skip,
}

/// A strictly better accuracy always wins over the periodic save.
pub fn save_decision(epoch: usize, accuracy: f64, best_acc: f64, save_epoch: usize) -> SaveDecision {
    if accuracy > best_acc {
        SaveDecision::Best
    } else if epoch % save_epoch == 0 {
        SaveDecision::Regular
    } else {
        SaveDecision::Skip
    }
}

// ─── RunContext ───────────────────────────────────────────────────────────────
/// Per-run state shared by every phase of the driver.
pub struct RunContext {
    pub config:      TrainConfig,
    pub checkpoints: CheckpointManager,
    pub sink:        RunLogger,
}

impl RunContext {
    /// Resolve the run folder (new, or the most recent one when
    /// resuming), open the logger and record the config. A resumed
    /// run keeps the train_config.json its folder started with.
    pub fn open(config: TrainConfig) -> Result<Self> {
        let s          = &config.settings;
        let started_at = Local::now().format(&s.date_format).to_string();
        let net_root   = s.checkpoint_dir.join(&config.net);

        let folder = if config.resume {
            most_recent_folder(&net_root, &s.date_format)?
                .ok_or_else(|| TrainError::NoRunFolder(net_root.clone()))?
        } else {
            started_at.clone()
        };

        let checkpoints = CheckpointManager::new(net_root.join(&folder))?;
        let sink        = RunLogger::open(s.log_dir.join(&config.net).join(&started_at))?;
        if config.resume && checkpoints.has_config() {
            tracing::debug!("Keeping the run's original train_config.json");
        } else {
            checkpoints.save_config(&config)?;
        }

        tracing::info!("Run folder: '{}'", checkpoints.dir().display());
        tracing::info!("Logging to '{}'", sink.dir().display());
        Ok(Self { config, checkpoints, sink })
    }
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_dir:           PathBuf,
    pub epochs_run:        Vec<usize>,
    /// Best accuracy re-established from the best checkpoint on
    /// resume; 0 for a fresh run
    pub baseline_accuracy: f64,
    pub best_accuracy:     f64,
    pub chart:             Option<PathBuf>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run on the wgpu device with -gpu, on the CPU otherwise.
    pub fn execute(&self) -> Result<TrainOutcome> {
        if self.config.gpu {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            self.execute_on::<GpuBackend>(device)
        } else {
            tracing::info!("Using CPU (ndarray) backend");
            self.execute_on::<CpuBackend>(NdArrayDevice::default())
        }
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainOutcome> {
        let all_start = Instant::now();
        let cfg       = &self.config;
        let s         = &cfg.settings;
        s.validate()?;

        // ── INIT ──────────────────────────────────────────────────────────────
        B::seed(s.seed);
        let mut model = models::build::<B>(&cfg.net, s.num_classes, &device)?;

        let train_loader = build_train_loader::<B>(s, cfg.batch_size, &device)?;
        let test_loader  = build_test_loader::<B::InnerBackend>(s, cfg.batch_size, &device)?;

        // SGD, momentum 0.9 without dampening, L2 weight decay
        let mut optim = SgdConfig::new()
            .with_momentum(Some(
                MomentumConfig::new().with_momentum(s.momentum).with_dampening(0.0),
            ))
            .with_weight_decay(Some(WeightDecayConfig::new(s.weight_decay)))
            .init::<B, models::Network<B>>();

        let iters_per_epoch =
            batches_per_epoch(train_loader.num_items(), worker_count(s), cfg.batch_size);
        let mut lr = LrController::new(
            cfg.lr, cfg.warm, iters_per_epoch, s.milestones.clone(), s.gamma,
        )?;

        let mut ctx = RunContext::open(cfg.clone())?;

        // ── RESUME-LOAD ───────────────────────────────────────────────────────
        let mut best_acc     = 0.0f64;
        let mut resume_epoch = 0usize;
        if cfg.resume {
            if let Some(best) = ctx.checkpoints.best_acc_weights()? {
                println!("found best acc weights file:{}", best.display());
                println!("load best training file to test acc...");
                model = load_weights(model, &best, &device)?;
                best_acc = evaluate(&model.valid(), &test_loader, 0, None)?.accuracy;
                println!("best acc is {best_acc:.2}");

                if let Some(stored) = load_record(&best)?.and_then(|r| r.accuracy) {
                    if (stored - best_acc).abs() > 1e-4 {
                        tracing::warn!(
                            "Best checkpoint was saved at accuracy {:.4} but re-evaluates to {:.4}",
                            stored, best_acc
                        );
                    }
                }
            }

            let recent = ctx
                .checkpoints
                .most_recent_weights()?
                .ok_or_else(|| TrainError::NoWeights(ctx.checkpoints.dir().to_path_buf()))?;
            println!("loading weights file {} to resume training.....", recent.display());
            model        = load_weights(model, &recent, &device)?;
            resume_epoch = ctx.checkpoints.last_epoch()?;
            tracing::info!("Resuming after epoch {} (best accuracy {:.4})", resume_epoch, best_acc);
        }

        let baseline_accuracy = best_acc;

        // ── EPOCH-LOOP ────────────────────────────────────────────────────────
        let mut history    = AccuracyHistory::new();
        let mut epochs_run = Vec::new();

        for epoch in 1..=s.epochs {
            lr.begin_epoch(epoch);
            if epoch <= resume_epoch {
                continue;
            }

            let (trained, train_summary) = train_epoch(
                epoch, model, &mut optim, &train_loader, &mut lr, iters_per_epoch, &mut ctx.sink,
            )?;
            model = trained;

            let eval = evaluate(
                &model.valid(),
                &test_loader,
                epoch,
                Some(&mut ctx.sink as &mut dyn MetricsSink),
            )?;
            history.push(epoch, eval.accuracy);
            epochs_run.push(epoch);
            tracing::debug!(
                "Epoch {}: {} batches in {:.2}s, {}/{} test images correct",
                epoch, train_summary.batches, train_summary.elapsed.as_secs_f64(),
                eval.correct, eval.total,
            );

            ctx.sink.log_epoch(&EpochMetrics {
                epoch,
                train_loss: train_summary.mean_loss,
                test_loss:  eval.average_loss,
                accuracy:   eval.accuracy,
                lr:         lr.current(),
            })?;

            let tag = match save_decision(epoch, eval.accuracy, best_acc, s.save_epoch) {
                SaveDecision::Best    => Some(CheckpointTag::Best),
                SaveDecision::Regular => Some(CheckpointTag::Regular),
                SaveDecision::Skip    => None,
            };
            if let Some(tag) = tag {
                let record = CheckpointRecord::new(&cfg.net, epoch, tag).with_accuracy(eval.accuracy);
                let path   = ctx.checkpoints.save(&model, &record)?;
                println!("saving weights file to {}", path.display());
                if tag == CheckpointTag::Best {
                    best_acc = eval.accuracy;
                }
            }
        }

        // ── FINALIZE ──────────────────────────────────────────────────────────
        ctx.sink.flush()?;
        let chart = render_accuracy_chart(&history, &cfg.net, &cfg.chart_dir)?;

        if let Some((epoch, acc)) = history.best() {
            tracing::info!("Best epoch of this invocation: {} (accuracy {:.4})", epoch, acc);
        }
        println!("Total time: {:.3}s", all_start.elapsed().as_secs_f64());
        tracing::info!("Training complete! Best accuracy {:.4}", best_acc);

        Ok(TrainOutcome {
            run_dir: ctx.checkpoints.dir().to_path_buf(),
            epochs_run,
            baseline_accuracy,
            best_accuracy: best_acc,
            chart,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    use crate::data::loader::IMAGE_BYTES;
    use crate::infra::checkpoint::{last_epoch, most_recent_weights, read_run_config};

    #[test]
    fn test_save_decision() {
        assert_eq!(save_decision(3, 0.5, 0.4, 10),  SaveDecision::Best);
        assert_eq!(save_decision(10, 0.5, 0.4, 10), SaveDecision::Best);
        assert_eq!(save_decision(10, 0.4, 0.4, 10), SaveDecision::Regular);
        assert_eq!(save_decision(11, 0.3, 0.4, 10), SaveDecision::Skip);
        // equal accuracy is not an improvement
        assert_eq!(save_decision(1, 0.0, 0.0, 10),  SaveDecision::Skip);
    }

    fn write_split(dir: &Path, file: &str, n: usize, classes: usize) {
        let mut bytes = Vec::new();
        for i in 0..n {
            let label = (i % classes) as u8;
            bytes.push(0);
            bytes.push(label);
            bytes.extend(std::iter::repeat(label * 60).take(IMAGE_BYTES));
        }
        fs::write(dir.join(file), bytes).unwrap();
    }

    fn config(root: &Path, epochs: usize, resume: bool) -> TrainConfig {
        TrainConfig {
            net:        "simplecnn".into(),
            batch_size: 4,
            lr:         0.05,
            resume,
            chart_dir:  root.join("charts"),
            settings:   Settings {
                data_dir:       root.join("data"),
                checkpoint_dir: root.join("checkpoint"),
                log_dir:        root.join("runs"),
                epochs,
                milestones:     vec![1],
                save_epoch:     1,
                num_workers:    1,
                num_classes:    3,
                ..Settings::default()
            },
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_resume_without_prior_run_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = RunContext::open(config(root.path(), 1, true)).err().unwrap();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::NoRunFolder(_))));
    }

    #[test]
    fn test_fresh_run_then_resume_runs_only_pending_epochs() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        fs::create_dir_all(&data).unwrap();
        write_split(&data, "train.bin", 8, 3);
        write_split(&data, "test.bin",  6, 3);

        // fresh run: two epochs, a checkpoint after each
        let first = TrainUseCase::new(config(root.path(), 2, false))
            .execute_on::<CpuBackend>(Default::default())
            .unwrap();
        assert_eq!(first.epochs_run, vec![1, 2]);
        assert_eq!(last_epoch(&first.run_dir).unwrap(), 2);
        assert!(first.run_dir.join("train_config.json").exists());
        assert!(first.chart.as_ref().unwrap().exists());

        // resume into the same folder with a longer schedule
        let second = TrainUseCase::new(config(root.path(), 3, true))
            .execute_on::<CpuBackend>(Default::default())
            .unwrap();
        assert_eq!(second.run_dir, first.run_dir);
        assert_eq!(second.epochs_run, vec![3]);
        assert_eq!(first.baseline_accuracy, 0.0);
        assert_eq!(second.baseline_accuracy, first.best_accuracy);
        assert!(second.best_accuracy >= first.best_accuracy);

        // the folder keeps the config of the run that created it
        let saved: TrainConfig = read_run_config(&second.run_dir).unwrap().unwrap();
        assert!(!saved.resume);
        assert_eq!(saved.settings.epochs, 2);

        let recent = most_recent_weights(&second.run_dir).unwrap().unwrap();
        let name   = recent.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("simplecnn-3-"), "unexpected newest file {name}");
    }
}
