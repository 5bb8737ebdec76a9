//! # CBS Housing Pipeline CLI
//!
//! Binary entry point: `housing <command>`.

use clap::{Parser, Subcommand};
use housing_analytics::Analysis;
use housing_pipeline::{Config, Pipeline};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "housing")]
#[command(about = "Extract, transform, analyze and load CBS housing statistics")]
#[command(version)]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch raw snapshots from the CBS API
    Extract {
        /// Stop each fact table after this many rows
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Build processed snapshots from the latest extraction
    Transform,

    /// Run the statistical analyses
    Analyze {
        /// Run a single analysis (temporal, regional, bottleneck, woningtype, correlation, seasonal)
        #[arg(long, value_parser = parse_analysis)]
        only: Option<Analysis>,
    },

    /// Load the processed snapshots into DuckDB
    Load,

    /// Delete all but the newest raw extractions
    Prune {
        /// Extractions to keep (defaults to KEEP_LAST_EXTRACTIONS)
        #[arg(long)]
        keep: Option<usize>,
    },

    /// Extract, transform, analyze and load
    Run {
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing before the config so unparseable settings are reported
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(|| fmt::layer()))
        .init();

    let config = Config::from_env();

    tracing::info!(version = housing_pipeline::VERSION, command = ?args.command, "starting");

    if let Err(err) = execute(&config, args.command) {
        tracing::error!(error = ?err, "command failed");
        return Err(err);
    }
    Ok(())
}

fn parse_analysis(name: &str) -> Result<Analysis, String> {
    name.parse().map_err(|e: housing_analytics::AnalyticsError| e.to_string())
}

fn execute(config: &Config, command: Command) -> anyhow::Result<()> {
    if let Command::Config = command {
        println!("{}", config.summary());
        return config.validate();
    }

    config.validate()?;
    let pipeline = Pipeline::open(config)?;

    match command {
        Command::Extract { max_rows } => {
            let summary = pipeline.extract(max_rows)?;
            tracing::info!(
                extraction_id = %summary.extraction_id,
                timestamp = %summary.timestamp,
                "extraction complete"
            );
        }
        Command::Transform => {
            pipeline.transform()?;
        }
        Command::Analyze { only } => {
            pipeline.analyze(only)?;
        }
        Command::Load => {
            pipeline.load()?;
        }
        Command::Prune { keep } => {
            pipeline.prune(keep.unwrap_or(config.keep_last_extractions))?;
        }
        Command::Run { max_rows } => pipeline.run(max_rows)?,
        Command::Config => {}
    }
    Ok(())
}
