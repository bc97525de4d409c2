//! Cloud Waste Detector CLI
//!
//! Scores, analyzes and plans remediation for billing exports and combines
//! cost forecasts locally, and queries a running waste agent for its latest
//! results.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, forecast, get, remediate, score};
use tracing_subscriber::EnvFilter;
use waste_lib::forecast::EnsembleConfig;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Cloud Waste Detector CLI
#[derive(Parser)]
#[command(name = "cwd")]
#[command(author, version, about = "CLI for the Cloud Waste Detector", long_about = None)]
pub struct Cli {
    /// Agent API endpoint URL [default: http://localhost:8080]
    #[arg(long, env = "CWD_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Path to the CLI config file [default: ~/.config/cwd/config.json]
    #[arg(long, env = "CWD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a billing usage CSV for wasteful spend
    Score {
        /// Cost-and-usage CSV export
        file: PathBuf,

        /// Zone where resources are expected to run
        #[arg(long)]
        primary_zone: Option<String>,

        /// Show only the top N recommendations
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Report daily spend trend and per-resource cost spikes
    Analyze {
        /// Cost-and-usage CSV export
        file: PathBuf,

        /// Peak over average cost ratio that counts as a spike
        #[arg(long)]
        spike_factor: Option<f64>,
    },

    /// Generate a Terraform import/destroy plan for recommended resources
    Remediate {
        /// Cost-and-usage CSV export
        file: PathBuf,

        /// Zone where resources are expected to run
        #[arg(long)]
        primary_zone: Option<String>,

        /// Lowest priority to include (high, medium, low)
        #[arg(long, default_value = "high")]
        min_priority: String,

        /// Region for resources whose zone names none
        #[arg(long)]
        region: Option<String>,

        /// Write the plan to this file or directory instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Combine statistical and ML forecast results into an ensemble
    Forecast {
        /// Statistical (ARIMA) model result JSON
        #[arg(long, conflicts_with = "dir")]
        statistical: Option<PathBuf>,

        /// Machine-learning (Prophet) model result JSON
        #[arg(long, conflicts_with = "dir")]
        ml: Option<PathBuf>,

        /// Results directory; the newest document of each model is used
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Daily cost baseline for the trend
        #[arg(long)]
        baseline: Option<f64>,

        /// Daily budget ceiling for the cost risk signal
        #[arg(long)]
        budget_ceiling: Option<f64>,
    },

    /// Query results from a running agent
    #[command(subcommand)]
    Get(GetCommands),

    /// Show agent health
    Status,
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Get the latest ranked recommendations
    Recommendations {
        /// Filter by priority (high, medium, low)
        #[arg(long, short)]
        priority: Option<String>,

        /// Filter by status (active, resolved, terminated)
        #[arg(long)]
        status: Option<String>,
    },

    /// Get the latest ensemble forecast
    Prediction {
        /// Ask the agent to combine its newest model results first
        #[arg(long)]
        run: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = config::Config::load(cli.config.as_deref())?;

    let format = match cli.format {
        Some(format) => format,
        None => match file_config.default_format.as_deref() {
            Some(name) => name
                .parse::<output::OutputFormat>()
                .map_err(anyhow::Error::msg)?,
            None => output::OutputFormat::default(),
        },
    };

    let api_url = cli
        .api_url
        .or(file_config.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    match cli.command {
        Commands::Score {
            file,
            primary_zone,
            limit,
        } => {
            score::score_file(&file, primary_zone, limit, format)?;
        }
        Commands::Analyze { file, spike_factor } => {
            analyze::analyze_file(&file, spike_factor, format)?;
        }
        Commands::Remediate {
            file,
            primary_zone,
            min_priority,
            region,
            output,
        } => {
            remediate::remediate_file(
                &file,
                primary_zone,
                &min_priority,
                region,
                output,
                format,
            )?;
        }
        Commands::Forecast {
            statistical,
            ml,
            dir,
            baseline,
            budget_ceiling,
        } => {
            let mut config = EnsembleConfig::default();
            if let Some(baseline) = baseline {
                config.cost_baseline = baseline;
            }
            if let Some(ceiling) = budget_ceiling {
                config.budget_ceiling = ceiling;
            }

            let input = match dir {
                Some(dir) => forecast::ForecastInput::Directory(dir),
                None => forecast::ForecastInput::Files { statistical, ml },
            };
            forecast::combine(input, config, format).await?;
        }
        Commands::Get(get_cmd) => {
            let client = client::ApiClient::new(&api_url)?;
            match get_cmd {
                GetCommands::Recommendations { priority, status } => {
                    get::get_recommendations(&client, priority, status, format).await?;
                }
                GetCommands::Prediction { run } => {
                    get::get_prediction(&client, run, format).await?;
                }
            }
        }
        Commands::Status => {
            let client = client::ApiClient::new(&api_url)?;
            get::show_status(&client, format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
