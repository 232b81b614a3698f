//! FeatureLab CLI: run the feature pipeline for one ticker.
//!
//! Commands:
//! - `run`: download, enrich and upload one ticker's daily history
//! - `catalog`: list the configured indicators and their output columns

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use featurelab_core::data::{CsvProvider, DataProvider, YahooProvider};
use featurelab_core::IndicatorRegistry;
use featurelab_runner::config::parse_date;
use featurelab_runner::{
    run_pipeline, BigQuerySink, ParquetSink, PipelineConfig, Sink, SinkKind, SourceKind,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "featurelab",
    about = "FeatureLab CLI: daily price feature pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one ticker, derive features and indicators, upload the table.
    Run(RunArgs),
    /// List the indicator catalog with each entry's output columns.
    Catalog {
        /// Path to a TOML config file. Defaults to the built-in catalog.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticker symbol (overrides config and TICKER_SYMBOL).
    #[arg(long)]
    ticker: Option<String>,

    /// Start date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date, exclusive (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// Price source.
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// CSV file for `--source csv`.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Destination warehouse.
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Root directory for the parquet sink.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Rows per upload chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Skip writing `{ticker}_original_data.csv`.
    #[arg(long, default_value_t = false)]
    no_snapshot: bool,

    /// OAuth bearer token for the BigQuery sink.
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Write the run report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Yahoo,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    Parquet,
    Bigquery,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_cmd(args),
        Commands::Catalog { config } => catalog_cmd(config.as_deref()),
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
///
/// With a log file, the returned guard must be held until the command
/// finishes; dropping it flushes the file writer.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let (writer, guard) = non_blocking(file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing: {err}"))?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing: {err}"))?;
        Ok(None)
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn apply_flags(config: &mut PipelineConfig, args: &RunArgs) -> Result<()> {
    if let Some(ticker) = &args.ticker {
        config.run.ticker = ticker.trim().to_string();
    }
    if let Some(start) = &args.start {
        config.run.start_date = Some(parse_date("--start", start)?);
    }
    if let Some(end) = &args.end {
        config.run.end_date = Some(parse_date("--end", end)?);
    }
    if let Some(source) = args.source {
        config.source.kind = match source {
            SourceArg::Yahoo => SourceKind::Yahoo,
            SourceArg::Csv => SourceKind::Csv,
        };
    }
    if let Some(csv) = &args.csv {
        config.source.csv_path = Some(csv.clone());
    }
    if let Some(sink) = args.sink {
        config.sink.kind = match sink {
            SinkArg::Parquet => SinkKind::Parquet,
            SinkArg::Bigquery => SinkKind::Bigquery,
        };
    }
    if let Some(dir) = &args.output_dir {
        config.sink.output_dir = dir.clone();
    }
    if let Some(size) = args.chunk_size {
        config.sink.chunk_size = size;
    }
    if args.no_snapshot {
        config.source.snapshot = false;
    }
    config.validate()?;
    Ok(())
}

fn build_provider(config: &PipelineConfig) -> Result<Box<dyn DataProvider>> {
    Ok(match config.source.kind {
        SourceKind::Yahoo => Box::new(YahooProvider::new()?),
        SourceKind::Csv => {
            let path = config
                .source
                .csv_path
                .as_ref()
                .ok_or_else(|| anyhow!("--source csv requires --csv PATH"))?;
            Box::new(CsvProvider::new(path))
        }
    })
}

fn build_sink(config: &PipelineConfig, access_token: Option<&str>) -> Result<Box<dyn Sink>> {
    Ok(match config.sink.kind {
        SinkKind::Parquet => Box::new(ParquetSink::new(&config.sink.output_dir)),
        SinkKind::Bigquery => {
            let (Some(project), Some(dataset)) = (&config.sink.project_id, &config.sink.dataset_id)
            else {
                bail!("bigquery sink requires BIGQUERY_PROJECT_ID and BIGQUERY_DATASET_ID");
            };
            let token = access_token
                .ok_or_else(|| anyhow!("bigquery sink requires GOOGLE_OAUTH_ACCESS_TOKEN"))?;
            Box::new(BigQuerySink::new(project.clone(), dataset.clone(), token)?)
        }
    })
}

fn run_cmd(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_flags(&mut config, &args)?;
    let _log_guard = init_tracing(&config.run.log_level, args.log_file.as_deref())?;

    info!(ticker = %config.run.ticker, "starting main processing");
    let provider = build_provider(&config)?;
    let sink = build_sink(&config, args.access_token.as_deref())?;

    let report = match run_pipeline(&config, &*provider, &*sink) {
        Ok(report) => report,
        Err(e) => {
            error!(terminal = %e.terminal_state(), "run failed");
            bail!("{} ({})", e, e.terminal_state());
        }
    };

    println!("{}", report.summary());
    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn catalog_cmd(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let registry = IndicatorRegistry::from_names(&config.indicators.catalog);

    println!("{:<16} OUTPUT COLUMNS", "INDICATOR");
    for (name, indicator) in registry.entries() {
        match indicator {
            Some(ind) => println!(
                "{:<16} {} (lookback {})",
                name,
                ind.outputs().join(", "),
                ind.lookback()
            ),
            None => println!("{name:<16} (unknown, filled with NaN)"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_reaches_log_file_once_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");

        let guard = init_tracing("info", Some(&path)).unwrap();
        assert!(guard.is_some());
        error!(terminal = "EMPTY_INPUT", "run failed");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("run failed"), "log file was: {contents:?}");
        assert!(contents.contains("EMPTY_INPUT"));
    }
}
