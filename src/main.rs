use anyhow::Context;
use clap::{Parser, Subcommand};
use direction_gbm::config::Settings;
use direction_gbm::data::{normalize_rates, DataLoader};
use direction_gbm::features::{add_all_features, make_label, split_xy};
use direction_gbm::model::search::JsonlRecorder;
use direction_gbm::model::{GbmParams, ParamSpace, SearchRunner, TrainedArtifacts, WalkForwardEvaluator};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "direction-gbm", about = "Bar direction prediction pipeline", version)]
struct Cli {
    /// Optional JSON settings file; defaults apply otherwise
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize raw rate records into clean bars
    Prepare {
        /// CSV of raw rate records
        #[arg(long)]
        rates: PathBuf,
        /// Output CSV of normalized bars
        #[arg(long)]
        bars: PathBuf,
    },
    /// Search hyperparameters, fit the winner on all bars and save it
    Train {
        /// CSV of normalized bars
        #[arg(long)]
        bars: PathBuf,
        /// Output path for the trained artifact bundle
        #[arg(long)]
        model: PathBuf,
        /// Append per-candidate run records here
        #[arg(long)]
        runs: Option<PathBuf>,
    },
    /// Predict up-probabilities for the most recent bars
    Predict {
        /// CSV of normalized bars
        #[arg(long)]
        bars: PathBuf,
        /// Trained artifact bundle
        #[arg(long)]
        model: PathBuf,
    },
}

fn load_settings(path: &Option<PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(p) => Settings::from_file(p),
        None => Ok(Settings::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;

    match cli.command {
        Command::Prepare { rates, bars } => {
            let raw = DataLoader::load_rates(&rates)?;
            let normalized = normalize_rates(&raw).context("failed to normalize rates")?;
            info!(raw = raw.len(), bars = normalized.len(), "normalized rate records");
            DataLoader::save_bars(&normalized, &bars)?;
        }
        Command::Train { bars, model, runs } => {
            let bars = DataLoader::load_bars(&bars)?;
            let features = add_all_features(&bars)?;
            let labeled = make_label(&features, settings.horizon)?;
            let (x, y) = split_xy(&labeled)?;

            let runner = SearchRunner {
                evaluator: WalkForwardEvaluator {
                    n_splits: settings.n_splits,
                    adf_alpha: settings.adf_alpha,
                    adf_min_obs: settings.adf_min_obs,
                    pca_variance: settings.pca_variance,
                },
                space: ParamSpace::default(),
                n_iter: settings.n_iter,
                seed: settings.seed,
                base: GbmParams {
                    seed: settings.seed,
                    ..GbmParams::default()
                },
            };

            let experiment = format!("{}_{}", settings.symbol, settings.timeframe);
            let outcome = match runs {
                Some(path) => {
                    let mut recorder = JsonlRecorder::create(&path)?;
                    runner.run_experiment(&experiment, &x, &y, &mut recorder)?
                }
                None => {
                    let mut recorder = direction_gbm::model::MemoryRecorder::default();
                    runner.run_experiment(&experiment, &x, &y, &mut recorder)?
                }
            };
            info!(
                best_aucpr = outcome.best_score,
                candidates = outcome.n_candidates,
                "search finished"
            );

            let artifacts = TrainedArtifacts::train(&settings, &bars, &outcome.best_params)?;
            artifacts.save(&model)?;
            info!(path = %model.display(), "saved trained artifacts");
        }
        Command::Predict { bars, model } => {
            let artifacts = TrainedArtifacts::load(&model)?;
            let bars = DataLoader::load_bars(&bars)?;
            let start = bars.len().saturating_sub(settings.entry_history_bars);
            let predictions = artifacts.predict(&bars[start..])?;

            for (timestamp, probability) in predictions {
                println!("{timestamp}\t{probability:.4}");
            }
        }
    }
    Ok(())
}
