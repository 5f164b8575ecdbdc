//! Stick Warfare - Development Tools

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sw-tools")]
#[command(about = "Development tools for Stick Warfare")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate ability catalogs and rosters
    Validate {
        /// Path to data directory
        #[arg(default_value = "data")]
        path: String,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {path}");
            match sw_tools::validate::validate_data_directory(std::path::Path::new(&path)) {
                Ok(report) if report.is_clean() => {
                    tracing::info!(
                        catalogs = report.catalogs,
                        sessions = report.sessions,
                        "Validation passed"
                    );
                }
                Ok(report) => {
                    for issue in &report.issues {
                        tracing::error!("{issue}");
                    }
                    tracing::error!("Validation failed: {} issue(s)", report.issues.len());
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
