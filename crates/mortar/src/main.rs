//! Mortar CLI - minimal static site generator with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "mortar")]
#[command(about = "Minimal static site generator with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to mortar.toml config file
    #[arg(short, long, default_value = "mortar.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the site
    Build {
        /// Use production constants (env.prod.toml)
        #[arg(long)]
        prod: bool,

        /// Output directory (defaults to config or "public")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build, watch for changes and serve with live reload
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "8008")]
        port: u16,

        /// Use production constants (env.prod.toml)
        #[arg(long)]
        prod: bool,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Preview the built site
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to config or "public")
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Build { prod, output } => {
            commands::build::run(&cli.config, prod, output).await?;
        }
        Commands::Dev {
            port,
            prod,
            no_open,
        } => {
            commands::dev::run(&cli.config, port, prod, !no_open).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(&cli.config, port, dir).await?;
        }
    }

    Ok(())
}
