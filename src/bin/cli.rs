//! Command-line trigger for the score aggregation engine.

use clap::Parser;
use tally::cli::{self, Cli};
use tally::config::Ctx;
use tally::telemetry::setup_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = Cli::parse();
    let ctx = Ctx::load_file(&parsed.config)?;
    setup_tracing(&ctx.log_level);

    cli::run_command(ctx, parsed.command).await?;
    Ok(())
}
