// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use photobooth::config::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "photobooth")]
#[command(about = "Kiosk photo booth: capture, stylize and share")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, env = "PHOTOBOOTH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Listen address, overrides the configuration
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Capture one cropped, mirrored still
    Capture {
        #[command(flatten)]
        source: cli::SourceArgs,

        /// Output file or directory (default: local media directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send an image through the generation service and store the result
    Process {
        /// JPEG or PNG still to process
        image: PathBuf,
    },

    /// Run one visit of the kiosk flow in the terminal
    Booth {
        #[command(flatten)]
        source: cli::SourceArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=photobooth=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        None => rt.block_on(photobooth::server::run(config))?,
        Some(Commands::Serve { addr }) => {
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            rt.block_on(photobooth::server::run(config))?
        }
        Some(Commands::Capture { source, output }) => {
            rt.block_on(cli::capture(&config, &source, output))?
        }
        Some(Commands::Process { image }) => rt.block_on(cli::process(&config, &image))?,
        Some(Commands::Booth { source }) => rt.block_on(cli::booth(&config, &source))?,
    }

    Ok(())
}
