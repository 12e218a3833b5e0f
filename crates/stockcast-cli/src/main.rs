mod cmd;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, forecast::ForecastArgs};
use std::path::PathBuf;
use stockcast_core::config::Config;

#[derive(Parser)]
#[command(
    name = "stockcast",
    about = "Per-product sales forecasts with a safety margin and stockout flags",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./stockcast.yaml when present)
    #[arg(long, global = true, env = "STOCKCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast every product in a sales file
    Forecast(ForecastArgs),

    /// Start the upload form web server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
        /// Don't open browser automatically
        #[arg(long)]
        no_open: bool,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    match cli.command {
        Commands::Forecast(args) => cmd::forecast::run(&config, args, cli.json),
        Commands::Serve { port, no_open } => cmd::serve::run(config, port, no_open),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
