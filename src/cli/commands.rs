// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `sweep`, `evaluate` and
// `components`, and all their flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → PathBuf, ...)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainOptions;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train from a config file, keeping the best checkpoint
    Train(TrainArgs),

    /// Train with the configuration supplied by the sweep environment
    /// (EPOCH_TRAINER_SWEEP_CONFIG / EPOCH_TRAINER_SWEEP_OVERRIDES)
    Sweep(SweepArgs),

    /// Restore the best checkpoint of a config and run one validation pass
    Evaluate(EvaluateArgs),

    /// List every dataset, model, loss, optimizer, scheduler and metric name
    Components,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Experiment config (.json, .yaml, .yml or .toml)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Log this run under <log-dir>/<run-name>; omit to train without logging
    #[arg(long)]
    pub run_name: Option<String>,

    /// Directory holding one sub-directory per logged run
    #[arg(long, default_value = "runs")]
    pub log_dir: PathBuf,
}

/// Convert CLI TrainArgs into the application-layer options.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainOptions {
    fn from(a: TrainArgs) -> Self {
        TrainOptions {
            config_path: Some(a.config),
            run_name:    a.run_name,
            log_dir:     a.log_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Name of this sweep trial; a timestamped name is used if omitted
    #[arg(long)]
    pub run_name: Option<String>,

    #[arg(long, default_value = "runs")]
    pub log_dir: PathBuf,
}

impl From<SweepArgs> for TrainOptions {
    fn from(a: SweepArgs) -> Self {
        TrainOptions {
            config_path: None,
            run_name:    a.run_name,
            log_dir:     a.log_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// The config the checkpoint was trained with
    #[arg(long, short)]
    pub config: PathBuf,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args() {
        let cli = Cli::try_parse_from(["epoch-trainer", "train", "-c", "exp.yaml", "--run-name", "a"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let options = TrainOptions::from(args);
        assert_eq!(options.config_path, Some(PathBuf::from("exp.yaml")));
        assert_eq!(options.run_name.as_deref(), Some("a"));
        assert_eq!(options.log_dir, PathBuf::from("runs"));
    }

    #[test]
    fn test_sweep_has_no_config() {
        let cli = Cli::try_parse_from(["epoch-trainer", "sweep"]).unwrap();
        let Commands::Sweep(args) = cli.command else { panic!("expected sweep") };
        assert_eq!(TrainOptions::from(args).config_path, None);
    }

    #[test]
    fn test_train_requires_config() {
        assert!(Cli::try_parse_from(["epoch-trainer", "train"]).is_err());
    }
}
