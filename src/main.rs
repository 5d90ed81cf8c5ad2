//! Worker Harness - scripted conversation testing for streaming RPC workers
//!
//! Runs YAML scenarios against a worker process that speaks
//! Content-Length framed JSON messages on stdio.

use clap::Parser;
use commands::Commands;
use worker_harness::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "worker-harness", about = "Scenario-driven test harness for streaming RPC workers")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.command.verbose());

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
