//! Single mission command

use super::{read_brief, report, MissionArgs, MissionContext, MissionEnd};
use crate::config::CliConfigLoader;
use crate::prompt;
use anyhow::{anyhow, Result};
use chrono::Local;
use shopper_core::{RunStatus, TrajectoryRecorder};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, clap::Args)]
#[command(group(clap::ArgGroup::new("mission").required(true).args(["item", "task", "raw"])))]
pub struct RunArgs {
    /// Item number from the brief's "Buy Next" list
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub item: Option<u32>,

    /// Freeform shopping request, wrapped with the brief
    #[arg(long)]
    pub task: Option<String>,

    /// Prompt sent exactly as given
    #[arg(long)]
    pub raw: Option<String>,

    /// Print the prompts and exit without calling the model
    #[arg(long)]
    pub dry_run: bool,

    /// Write the trajectory to this file
    #[arg(long)]
    pub trajectory_file: Option<PathBuf>,

    #[command(flatten)]
    pub mission: MissionArgs,
}

impl RunArgs {
    /// Build the mission text
    fn mission_prompt(&self, working_dir: &std::path::Path) -> Result<String> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        let brief = read_brief(working_dir, self.mission.brief.as_deref())?;
        match (self.item, &self.task) {
            (Some(item), _) => Ok(prompt::build_task_prompt(item, &brief)),
            (None, Some(task)) => Ok(prompt::build_freeform_prompt(task, &brief)),
            (None, None) => Err(anyhow!("One of --item, --task or --raw is required")),
        }
    }
}

/// Run one mission and report how it ended
pub async fn run_command(
    args: RunArgs,
    config_loader: CliConfigLoader,
    working_dir: PathBuf,
) -> Result<RunStatus> {
    let mission = args.mission_prompt(&working_dir)?;

    if args.dry_run {
        println!(
            "{}",
            prompt::build_system_prompt(&working_dir, Local::now().date_naive())
        );
        println!("{}", mission);
        return Ok(RunStatus::Completed);
    }

    let loaded = config_loader.load().await?;
    let context = MissionContext::prepare(loaded, working_dir, &args.mission).await?;
    let trajectory = args.trajectory_file.as_ref().map(TrajectoryRecorder::with_file);

    let outcome = match context.run_mission(mission, trajectory).await? {
        MissionEnd::Finished(outcome) | MissionEnd::Stopped(outcome) => outcome,
        MissionEnd::Abandoned => return Ok(RunStatus::Failed),
    };

    report("Run", &outcome);
    if let Some(path) = &args.trajectory_file {
        info!("Trajectory saved to {}", path.display());
    }
    Ok(outcome.status)
}
