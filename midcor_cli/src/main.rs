mod cli;
mod database;
mod errors;
mod processing;

use clap::Parser;
use tracing::subscriber::set_global_default;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::EnvFilter;

use crate::cli::{
    Args,
    Commands,
};
use crate::errors::CliError;
use crate::processing::run_correct;

/// Converts verbosity flags to a log level string.
/// If RUST_LOG is set, it takes precedence.
fn get_log_level(verbose: u8, quiet: u8) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }

    let effective = verbose as i8 - quiet as i8;
    match effective {
        2.. => "trace".to_string(),
        1 => "debug".to_string(),
        0 => "info".to_string(),
        -1 => "warn".to_string(),
        _ => "error".to_string(),
    }
}

fn main() -> Result<(), CliError> {
    let args = Args::parse();

    let log_level = get_log_level(args.verbose, args.quiet);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.parse().unwrap())
        .from_env_lossy();
    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE),
    );
    set_global_default(subscriber).expect("Setting default subscriber failed");

    match args.command {
        Some(Commands::Correct(args)) => run_correct(&args)?,
        None => {
            println!("No command provided");
        }
    }
    Ok(())
}
