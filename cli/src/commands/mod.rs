//! CLI command implementations

pub mod batch;
pub mod run;
pub mod tools;

pub use batch::{batch_command, BatchArgs};
pub use run::{run_command, RunArgs};
pub use tools::tools_command;

use crate::config::LoadedConfig;
use crate::prompt;
use crate::tools::computer::{Desktop, Scaler, ScreenSize};
use crate::tools::{create_cli_tool_registry, ComputerToolFactory, MacDesktop};
use anyhow::{Context, Result};
use chrono::Local;
use shopper_core::tools::ToolRegistry;
use shopper_core::{
    AgentBuilder, AgentConfig, RunOutcome, RunStatus, StopSignal, TrajectoryRecorder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Options shared by every command that runs missions
#[derive(Debug, Clone, clap::Args)]
pub struct MissionArgs {
    /// Display to capture (1-indexed, defaults to the main display)
    #[arg(short = 'd', long)]
    pub display: Option<u32>,

    /// Logical screen size, skipping detection (e.g. 1470x956)
    #[arg(long)]
    pub screen: Option<ScreenSize>,

    /// Override the iteration ceiling
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Shopping brief (defaults to docs/shopping-brief.md)
    #[arg(long)]
    pub brief: Option<PathBuf>,
}

/// How a mission ended from the command's point of view
pub enum MissionEnd {
    /// Ran to a terminal status on its own
    Finished(RunOutcome),
    /// Stopped between rounds after Ctrl-C
    Stopped(RunOutcome),
    /// Dropped mid-step after a second Ctrl-C
    Abandoned,
}

/// Everything needed to start missions, resolved once per command
pub struct MissionContext {
    pub agent: AgentConfig,
    pub loaded: LoadedConfig,
    registry: ToolRegistry,
}

impl MissionContext {
    /// Resolve configuration, the system prompt and the tools
    pub async fn prepare(
        loaded: LoadedConfig,
        working_dir: PathBuf,
        args: &MissionArgs,
    ) -> Result<Self> {
        let mut agent = loaded.agent.clone();
        if let Some(max) = args.max_iterations {
            agent.max_iterations = max;
        }
        if agent.system_prompt.is_none() {
            agent.system_prompt = Some(prompt::build_system_prompt(
                &working_dir,
                Local::now().date_naive(),
            ));
        }

        let computer = if agent.tools.iter().any(|t| t == "computer") {
            Some(detect_computer(args.display, args.screen).await?)
        } else {
            None
        };
        let registry = create_cli_tool_registry(&working_dir, computer);

        info!(
            "Model {} via {}, tools [{}], max_iterations={}, cwd={}",
            loaded.llm.model,
            loaded.llm.protocol.as_str(),
            agent.tools.join(", "),
            agent.max_iterations,
            working_dir.display()
        );
        if let Some(source) = &loaded.source {
            info!("Configuration from {}", source.display());
        }

        Ok(Self {
            agent,
            loaded,
            registry,
        })
    }

    /// Run one mission with freshly created tools
    ///
    /// The first Ctrl-C lets the current step finish and ends the run with
    /// its usual teardown; a second one abandons it on the spot.
    pub async fn run_mission(
        &self,
        mission: String,
        trajectory: Option<TrajectoryRecorder>,
    ) -> Result<MissionEnd> {
        let stop = StopSignal::new();
        let run = self.start_mission(mission, trajectory, stop.clone());
        tokio::pin!(run);

        tokio::select! {
            outcome = &mut run => return Ok(MissionEnd::Finished(outcome?)),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping after the current step (Ctrl-C again to abort)");
                stop.stop();
            }
        }

        tokio::select! {
            outcome = &mut run => Ok(MissionEnd::Stopped(outcome?)),
            _ = tokio::signal::ctrl_c() => {
                warn!("Aborted; no usage summary or run_complete entry for this run");
                Ok(MissionEnd::Abandoned)
            }
        }
    }

    async fn start_mission(
        &self,
        mission: String,
        trajectory: Option<TrajectoryRecorder>,
        stop: StopSignal,
    ) -> Result<RunOutcome> {
        let mut builder = AgentBuilder::new(self.loaded.llm.clone())
            .with_agent_config(self.agent.clone())
            .with_stop_signal(stop);
        if let Some(recorder) = trajectory {
            builder = builder.with_trajectory(recorder);
        }
        let agent = builder.build(&self.registry)?;
        if let Some(path) = agent.trajectory_path() {
            info!("Trajectory: {}", path.display());
        }

        info!("Prompt: {}", mission);
        Ok(agent.run(mission).await)
    }
}

async fn detect_computer(
    display: Option<u32>,
    screen: Option<ScreenSize>,
) -> Result<ComputerToolFactory> {
    let desktop: Arc<dyn Desktop> = Arc::new(
        MacDesktop::new(display).context("The computer tool is not available on this machine")?,
    );
    match screen {
        Some(size) => Ok(ComputerToolFactory::new(desktop, Scaler::new(size))),
        None => ComputerToolFactory::detect(desktop)
            .await
            .context("Failed to detect the display size; pass --screen WIDTHxHEIGHT"),
    }
}

/// Load the brief named on the command line, relative to the working directory
pub fn read_brief(working_dir: &Path, brief: Option<&Path>) -> Result<String> {
    prompt::load_brief(&prompt::brief_path(working_dir, brief))
}

/// Print the outcome of one mission to stdout
pub fn report(label: &str, outcome: &RunOutcome) {
    println!(
        "{}: {} after {} iteration(s), {} tool call(s), ${:.4}, {:.1}s",
        label,
        outcome.status,
        outcome.iterations,
        outcome.tool_calls,
        outcome.usage.cost(),
        outcome.duration_ms as f64 / 1000.0
    );
    if let Some(error) = &outcome.error {
        println!("  error: {}", error);
    }
    match outcome.status {
        RunStatus::Failed => warn!("{} failed", label),
        _ => {
            if let Some(text) = outcome.final_text() {
                println!("\n{}", text);
            }
        }
    }
}
