// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands, `train` and `test`, with the short flag
// names of the original scripts (-net, -b, -warm, ...).
//
// clap only knows `--long` and single-letter `-s` flags, so
// normalise_args rewrites a single-dash word flag into its
// double-dash form before parsing:
//
//   -net vgg16 -b 64 -gpu  →  --net vgg16 -b 64 --gpu
//
// Single letters (-b) and negative numbers pass through as-is.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    settings::Settings,
    test_use_case::TestConfig,
    train_use_case::TrainConfig,
};

/// The two top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a network, optionally resuming the most recent run
    Train(TrainArgs),

    /// Report top-1 / top-5 error of a saved weights file
    Test(TestArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Network type (simplecnn, vgg11/13/16/19, resnet18/34)
    #[arg(long)]
    pub net: String,

    /// Train on the wgpu device instead of the CPU
    #[arg(long)]
    pub gpu: bool,

    /// Batch size for the data loaders
    #[arg(short = 'b', default_value_t = 128)]
    pub batch_size: usize,

    /// Warmup epochs
    #[arg(long, default_value_t = 1)]
    pub warm: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    /// Resume the most recent run of this network
    #[arg(long)]
    pub resume: bool,

    /// JSON file overriding the built-in settings
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Directory for the accuracy chart
    #[arg(long, default_value = ".")]
    pub chart_dir: PathBuf,
}

impl TrainArgs {
    /// The application layer never sees clap types.
    pub fn into_config(self, settings: Settings) -> TrainConfig {
        TrainConfig {
            net:        self.net,
            gpu:        self.gpu,
            batch_size: self.batch_size,
            warm:       self.warm,
            lr:         self.lr,
            resume:     self.resume,
            chart_dir:  self.chart_dir,
            settings,
        }
    }
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Network type the weights were trained with
    #[arg(long)]
    pub net: String,

    /// Weights file to evaluate
    #[arg(long)]
    pub weights: PathBuf,

    /// Evaluate on the wgpu device instead of the CPU
    #[arg(long)]
    pub gpu: bool,

    /// Batch size for the test loader
    #[arg(short = 'b', default_value_t = 16)]
    pub batch_size: usize,

    /// JSON file overriding the built-in settings
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Also write the result as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl TestArgs {
    pub fn into_config(self, settings: Settings) -> TestConfig {
        TestConfig {
            net:        self.net,
            weights:    self.weights,
            gpu:        self.gpu,
            batch_size: self.batch_size,
            report:     self.report,
            settings,
        }
    }
}

/// Rewrite `-word` flags to `--word`.
pub fn normalise_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let is_word_flag = i > 0
                && arg.len() > 2
                && arg.starts_with('-')
                && !arg.starts_with("--")
                && arg[1..].starts_with(|c: char| c.is_ascii_alphabetic());
            if is_word_flag { format!("-{arg}") } else { arg }
        })
        .collect()
}
