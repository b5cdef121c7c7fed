//! Query Builder CLI
//!
//! Applies edit scripts to query trees and validates configurations.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qb_core::traits::IdGenerator;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

use settings::{CliSettings, LogFormat};

#[derive(Parser)]
#[command(name = "query-builder", version)]
#[command(about = "Edit and validate query builder trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an edit script and print the resulting query
    Apply {
        /// Builder configuration (.json, .yaml or .yml)
        #[arg(long)]
        config: PathBuf,

        /// Query to start from (default: an empty query)
        #[arg(long)]
        query: Option<PathBuf>,

        /// JSON array of edit commands
        #[arg(long)]
        script: PathBuf,
    },
    /// Validate a configuration, and optionally a query against it
    Validate {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        query: Option<PathBuf>,
    },
    /// Print an empty query
    New,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let settings = CliSettings::from_env().unwrap_or_else(|e| {
        eprintln!("{}, using defaults", e);
        CliSettings::default()
    });

    init_tracing(settings.log_format);

    let cli = Cli::parse();
    match cli.command {
        Commands::Apply {
            config,
            query,
            script,
        } => {
            let ids: Arc<dyn IdGenerator> = Arc::from(settings.id_strategy.generator());
            let json = commands::apply(&config, query.as_deref(), &script, ids)?;
            println!("{}", json);
        }
        Commands::Validate { config, query } => {
            let messages = commands::validate(&config, query.as_deref())?;
            if !messages.is_empty() {
                for message in &messages {
                    println!("{}", message);
                }
                warn!(problems = messages.len(), "Validation failed");
                return Ok(ExitCode::FAILURE);
            }
            info!("Valid");
        }
        Commands::New => println!("{}", commands::new_query()?),
    }

    Ok(ExitCode::SUCCESS)
}

/// Log to stderr so stdout carries only query JSON
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
