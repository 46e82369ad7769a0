//! ## callscope-cli
//! **Headless capture front end**
//!
//! Loads layered configuration, applies command line overrides and runs the
//! capture manager until interrupted or until every replayed file is read.

use clap::Parser;

mod commands;
mod tally;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
