//! Ondas CLI - offline demodulation and diagnostics for the ondas SDR
//! receiver.

mod commands;
mod config;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ondas")]
#[command(author, version, about = "Ondas SDR receiver CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Demodulate a raw I/Q capture to 8 kHz PCM
    Demod(commands::demod::DemodArgs),

    /// Report per-block signal levels of a raw I/Q capture
    Levels(commands::levels::LevelsArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demod(args) => commands::demod::run(args),
        Commands::Levels(args) => commands::levels::run(args),
    }
}
