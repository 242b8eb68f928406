use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ferry_forecast::data::{load_series, save_forecast, write_forecast};
use ferry_forecast::evaluation::{holdout, rolling_origin};
use ferry_forecast::ml::ModelBundle;
use ferry_forecast::{ForecastPipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "ferry-forecast")]
#[command(version = "0.1.0")]
#[command(about = "Quantile forecasts of daily ferry ticket redemptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines (filter with RUST_LOG)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train quantile models on a redemption history
    Train {
        /// CSV with date,redemption_count rows
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the model bundle
        #[arg(short, long, default_value = "models/ferry_bundle.json")]
        output: PathBuf,
    },
    /// Forecast the days after the end of a history
    Forecast {
        /// Trained model bundle
        #[arg(short, long)]
        model: PathBuf,
        /// CSV history the forecast continues from
        #[arg(short, long)]
        input: PathBuf,
        /// Days to forecast
        #[arg(long, default_value = "14")]
        horizon: usize,
        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score models on held-out days
    Backtest {
        /// CSV with date,redemption_count rows
        #[arg(short, long)]
        input: PathBuf,
        /// Days held out at the end of the series
        #[arg(long, default_value = "28")]
        holdout: usize,
        /// Run rolling-origin validation with N folds instead of a single holdout
        #[arg(long)]
        folds: Option<usize>,
        /// Days per rolling-origin fold
        #[arg(long, default_value = "14")]
        horizon: usize,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(short, long, default_value = "ferry-forecast.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json)?;

    match cli.command {
        Commands::Train { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            train(config, &input, &output).await?;
        }
        Commands::Forecast { model, input, horizon, output } => {
            forecast(&model, &input, horizon, output.as_deref())?;
        }
        Commands::Backtest { input, holdout, folds, horizon } => {
            let config = load_config(cli.config.as_deref())?;
            backtest(&config, &input, holdout, folds, horizon)?;
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", output.display());
            }
            PipelineConfig::default()
                .write_toml(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    if json {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level.to_string().to_lowercase()));
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("Failed to install JSON logger: {}", e))?;
        return Ok(());
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })
}

async fn train(config: PipelineConfig, input: &Path, output: &Path) -> Result<()> {
    info!("═══════════════════════════════════════════════════");
    info!("Ferry Redemption Model Training");
    info!("═══════════════════════════════════════════════════");

    info!("━━━ Step 1: Loading history ━━━");
    let series = load_series(input).with_context(|| format!("Failed to read {}", input.display()))?;
    info!("✓ Loaded {} days ({:?} to {:?})", series.len(), series.first_date(), series.last_date());

    info!("━━━ Step 2: Training quantile models ━━━");
    let pipeline = ForecastPipeline::new(config)?;
    let bundle = pipeline.fit_async(&series).await.context("Training failed")?;
    info!(
        "✓ Trained {} quantile models on {} rows",
        bundle.models.len(),
        bundle.metadata.training_rows
    );
    if bundle.seasonal.is_none() {
        warn!("Seasonal baseline not fitted (history too short)");
    }

    info!("━━━ Step 3: Saving model bundle ━━━");
    bundle
        .save(output)
        .with_context(|| format!("Failed to save bundle to {}", output.display()))?;
    info!("✓ Saved to {}", output.display());
    Ok(())
}

fn forecast(model: &Path, input: &Path, horizon: usize, output: Option<&Path>) -> Result<()> {
    let bundle = ModelBundle::load(model).with_context(|| format!("Failed to load {}", model.display()))?;
    let series = load_series(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let forecast = ForecastPipeline::forecast(&bundle, &series, horizon)?;
    if !forecast.crossings.is_empty() {
        warn!("{} quantile crossings corrected", forecast.crossings.len());
    }

    match output {
        Some(path) => {
            save_forecast(&forecast.intervals, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} forecast days to {}", forecast.intervals.len(), path.display());
        }
        None => write_forecast(std::io::stdout().lock(), &forecast.intervals)?,
    }
    Ok(())
}

fn backtest(
    config: &PipelineConfig,
    input: &Path,
    holdout_days: usize,
    folds: Option<usize>,
    horizon: usize,
) -> Result<()> {
    let series = load_series(input).with_context(|| format!("Failed to read {}", input.display()))?;

    match folds {
        Some(folds) => rolling_origin(&series, folds, horizon, config)?.print_summary(),
        None => holdout(&series, holdout_days, config)?.print_summary(),
    }
    Ok(())
}
