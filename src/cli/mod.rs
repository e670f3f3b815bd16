// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and routes to Layer 2.
//
//   train  — train (or resume) a network on CIFAR-100
//   test   — top-1 / top-5 error of a saved weights file
//
// Settings are loaded here (defaults or --settings JSON) so the
// use cases receive a complete, validated config.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TestArgs, TrainArgs};

use crate::application::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "cifar-trainer",
    version = "0.1.0",
    about = "Train CIFAR-100 image classifiers with Burn and evaluate their top-1/top-5 error."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse the process arguments, accepting `-word` style flags.
    pub fn parse_normalised() -> Self {
        Self::parse_from(commands::normalise_args(std::env::args()))
    }

    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let settings = Settings::load(args.settings.as_deref())?;
    tracing::info!("Training {} (resume: {})", args.net, args.resume);

    let outcome = TrainUseCase::new(args.into_config(settings)).execute()?;
    println!(
        "Training complete: {} epochs run, best accuracy {:.4}, checkpoints in {}",
        outcome.epochs_run.len(),
        outcome.best_accuracy,
        outcome.run_dir.display()
    );
    if let Some(chart) = outcome.chart {
        println!("Accuracy chart: {}", chart.display());
    }
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let settings = Settings::load(args.settings.as_deref())?;
    tracing::info!("Testing {} with '{}'", args.net, args.weights.display());

    TestUseCase::new(args.into_config(settings)).execute()?;
    Ok(())
}
