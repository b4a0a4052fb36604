//! CLI trigger for aggregation runs, plus score and checkpoint inspection.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::config::Ctx;
use crate::feed;
use crate::orchestrator::Orchestrator;
use crate::store;

#[derive(Debug, Parser)]
#[command(name = "tally")]
#[command(about = "Partitioned batch aggregation of session events into user scores")]
#[command(version)]
pub struct Cli {
    /// Path to TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply all pending session events to the score table
    Run {
        /// Number of partitions (and logical workers)
        #[arg(short = 'p', long = "partitions")]
        partitions: Option<u32>,
        /// Deltas committed per transaction
        #[arg(long = "chunk-size")]
        chunk_size: Option<u32>,
    },
    /// Print the aggregated score for one user
    Score {
        /// User id to look up
        #[arg(short = 'u', long = "user")]
        user_id: i64,
    },
    /// Show per-partition checkpoint positions
    Status,
}

pub async fn run_command(ctx: Ctx, command: Commands) -> anyhow::Result<()> {
    let pool = ctx.get_sqlite_pool().await?;
    sqlx::migrate!().run(&pool).await?;

    match command {
        Commands::Run {
            partitions,
            chunk_size,
        } => {
            let run_config = ctx.run_config(partitions, chunk_size);
            info!(
                partitions = run_config.partition_count,
                chunk_size = run_config.chunk_size,
                "starting aggregation run"
            );

            let report = Orchestrator::new(pool).execute(&run_config).await?;
            println!(
                "run {} {:?}: {} events in {} chunks across {} partitions",
                report.run_id,
                report.state,
                report.events_applied,
                report.chunks_committed,
                report.summaries.len(),
            );
        }
        Commands::Score { user_id } => match store::fetch_score(&pool, user_id).await? {
            Some(score) => println!("user {user_id}: {score}"),
            None => println!("user {user_id}: no score recorded"),
        },
        Commands::Status => {
            let checkpoints = feed::list_checkpoints(&pool).await?;
            if checkpoints.is_empty() {
                println!("no checkpoints recorded");
            }
            for checkpoint in checkpoints {
                println!(
                    "partition {}/{}: last committed event {} at {}",
                    checkpoint.partition_index,
                    checkpoint.partition_count,
                    checkpoint.last_event_id,
                    checkpoint.updated_at.and_utc(),
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_parses_overrides() {
        let cli = Cli::try_parse_from([
            "tally",
            "--config",
            "tally.toml",
            "run",
            "--partitions",
            "4",
            "--chunk-size",
            "25",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                partitions,
                chunk_size,
            } => {
                assert_eq!(partitions, Some(4));
                assert_eq!(chunk_size, Some(25));
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn score_command_requires_a_user() {
        assert!(Cli::try_parse_from(["tally", "--config", "tally.toml", "score"]).is_err());
    }
}
