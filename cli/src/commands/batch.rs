//! Run several items back to back

use super::{read_brief, report, MissionArgs, MissionContext, MissionEnd};
use crate::config::CliConfigLoader;
use crate::prompt;
use anyhow::Result;
use chrono::Local;
use shopper_core::{RunOutcome, RunStatus, TrajectoryRecorder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, clap::Args)]
pub struct BatchArgs {
    /// Item numbers from the brief's "Buy Next" list, e.g. 1,2,3
    #[arg(
        long,
        required = true,
        value_delimiter = ',',
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub items: Vec<u32>,

    /// Pause between items, in seconds
    #[arg(long, default_value_t = 30)]
    pub pause_secs: u64,

    /// Write one trajectory file per item into this directory
    #[arg(long)]
    pub trajectory_dir: Option<PathBuf>,

    #[command(flatten)]
    pub mission: MissionArgs,
}

/// How one item of a batch went
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub item: u32,
    pub status: RunStatus,
    pub cost: f64,
}

impl ItemResult {
    fn from_outcome(item: u32, outcome: &RunOutcome) -> Self {
        Self {
            item,
            status: outcome.status,
            cost: outcome.usage.cost(),
        }
    }

    fn failed(item: u32) -> Self {
        Self {
            item,
            status: RunStatus::Failed,
            cost: 0.0,
        }
    }
}

/// Trajectory file for one item of a batch
fn trajectory_path(dir: &Path, item: u32) -> PathBuf {
    dir.join(format!(
        "item_{}_{}.json",
        item,
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Overall status: failed if any item failed
pub fn batch_status(results: &[ItemResult]) -> RunStatus {
    if results.iter().any(|r| r.status == RunStatus::Failed) {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    }
}

/// Run one independent mission per item
///
/// Each item gets its own tools and transcript. A failed item is logged
/// and the batch moves on; Ctrl-C ends the batch after the current item.
pub async fn batch_command(
    args: BatchArgs,
    config_loader: CliConfigLoader,
    working_dir: PathBuf,
) -> Result<RunStatus> {
    let brief = read_brief(&working_dir, args.mission.brief.as_deref())?;
    let loaded = config_loader.load().await?;
    let context = MissionContext::prepare(loaded, working_dir, &args.mission).await?;
    if let Some(dir) = &args.trajectory_dir {
        std::fs::create_dir_all(dir)?;
    }

    let pause = Duration::from_secs(args.pause_secs);
    let mut results = Vec::with_capacity(args.items.len());

    for (index, &item) in args.items.iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            info!("Pausing {}s before item #{}", pause.as_secs(), item);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Batch interrupted before item #{}", item);
                    break;
                }
            }
        }

        info!("=== Item #{} ({}/{}) ===", item, index + 1, args.items.len());
        let trajectory = args
            .trajectory_dir
            .as_ref()
            .map(|dir| TrajectoryRecorder::with_file(trajectory_path(dir, item)));

        let mission = prompt::build_task_prompt(item, &brief);
        match context.run_mission(mission, trajectory).await {
            Ok(MissionEnd::Finished(outcome)) => {
                report(&format!("Item #{}", item), &outcome);
                results.push(ItemResult::from_outcome(item, &outcome));
            }
            Ok(MissionEnd::Stopped(outcome)) => {
                report(&format!("Item #{}", item), &outcome);
                results.push(ItemResult::from_outcome(item, &outcome));
                warn!("Batch interrupted during item #{}", item);
                break;
            }
            Ok(MissionEnd::Abandoned) => {
                results.push(ItemResult::failed(item));
                warn!("Batch aborted during item #{}", item);
                break;
            }
            Err(e) => {
                error!("Item #{} could not start: {:#}", item, e);
                results.push(ItemResult::failed(item));
            }
        }
    }

    println!("\nBatch summary:");
    for result in &results {
        println!("  #{:<3} {:<10} ${:.4}", result.item, result.status.to_string(), result.cost);
    }
    let total: f64 = results.iter().map(|r| r.cost).sum();
    println!("  total cost ${:.4}", total);

    Ok(batch_status(&results))
}
