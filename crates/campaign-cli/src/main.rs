// campaign-cli/src/main.rs
// ============================================================================
// Module: Campaign CLI Entry Point
// Description: Thin binary wrapper around campaign_cli::dispatch.
// Purpose: Parse arguments and hand off to the library's command dispatcher.
// Dependencies: campaign-cli, tokio
// ============================================================================

use std::process::ExitCode;

use clap::Parser as _;

/// Parses arguments and dispatches to the matched subcommand handler.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = campaign_cli::Cli::parse();
    campaign_cli::dispatch(cli).await
}
