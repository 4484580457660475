//! Stagehand CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Deployment pipeline and build-role synthesizer", long_about = None)]
struct Cli {
    /// Path to the deployment configuration
    #[arg(long, short, global = true, default_value = "stagehand.kdl")]
    config: PathBuf,

    /// Override the configured account id
    #[arg(long, global = true, env = "STAGEHAND_ACCOUNT_ID")]
    account: Option<String>,

    /// Override the configured region
    #[arg(long, global = true, env = "STAGEHAND_REGION")]
    region: Option<String>,

    /// Log as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize and render the deployment manifest
    Synth {
        /// Only this pipeline
        #[arg(long)]
        pipeline: Option<String>,
        /// Print plan fingerprints instead of the manifest
        #[arg(long)]
        fingerprint: bool,
    },
    /// Print the synthesized build identity
    Policy {
        /// Only this pipeline
        #[arg(long)]
        pipeline: Option<String>,
    },
    /// Print the composed pipeline stages
    Graph {
        /// Only this pipeline
        #[arg(long)]
        pipeline: Option<String>,
    },
    /// Validate the deployment configuration
    Validate,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let overrides = commands::Overrides {
        account: cli.account,
        region: cli.region,
    };

    match cli.command {
        Commands::Synth {
            pipeline,
            fingerprint,
        } => {
            commands::synth::run(&cli.config, overrides, pipeline.as_deref(), fingerprint).await?;
        }
        Commands::Policy { pipeline } => {
            commands::policy::run(&cli.config, overrides, pipeline.as_deref())?;
        }
        Commands::Graph { pipeline } => {
            commands::graph::run(&cli.config, overrides, pipeline.as_deref())?;
        }
        Commands::Validate => {
            commands::validate(&cli.config, overrides).await;
        }
    }

    Ok(())
}
