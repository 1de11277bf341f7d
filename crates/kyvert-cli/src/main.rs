//! kyvert — convert legacy admission policies to CEL-based
//! `ValidatingPolicy` documents.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kyvert_cli::check::{run_check, CheckArgs};
use kyvert_cli::convert::{run_convert, ConvertArgs};

#[derive(Parser, Debug)]
#[command(name = "kyvert", version, about = "Legacy policy to ValidatingPolicy converter")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a legacy policy file to a ValidatingPolicy document.
    Convert(ConvertArgs),
    /// Evaluate a legacy policy against a resource document offline.
    Check(CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "kyvert=warn",
        1 => "kyvert=info",
        2 => "kyvert=debug",
        _ => "kyvert=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Check(args) => run_check(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
