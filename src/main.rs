//! Binary entry point for the SmartRAG development harness.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use smartrag::cli::output::{OutputFormat, format_error};
use smartrag::cli::{Cli, execute};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match execute(&cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match format {
                OutputFormat::Json => println!("{{\"error\": \"{err}\"}}"),
                OutputFormat::Text => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
