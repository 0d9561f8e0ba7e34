//! The agent loop

use crate::agent::config::AgentConfig;
use crate::agent::context::ContextStrategy;
use crate::agent::conversation::Conversation;
use crate::agent::outcome::{RunOutcome, RunStatus};
use crate::agent::usage::UsageTracker;
use crate::error::{AgentError, Error};
use crate::llm::{ContentBlock, LlmClient, LlmMessage, LlmRequest, StopReason, ToolDefinition};
use crate::tools::{ToolCall, ToolExecutor};
use crate::trajectory::{TrajectoryEntry, TrajectoryRecorder};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where the loop stands between steps
enum LoopState {
    AwaitingModelResponse,
    AwaitingToolDispatch { calls: Vec<ToolCall>, step_cost: f64 },
    Terminated { status: RunStatus, error: Option<String> },
}

/// Asks a running loop to stop before its next consultation
///
/// The round in flight finishes first, so every tool request still gets its
/// result and the run ends `failed` with the usual teardown.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one mission from the first consultation to a terminal status
///
/// A loop runs once: [`AgentLoop::run`] consumes it, and the tools it owns
/// are shut down before the outcome is returned.
pub struct AgentLoop {
    config: AgentConfig,
    client: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    context: Box<dyn ContextStrategy>,
    trajectory: Option<TrajectoryRecorder>,
    stop: Option<StopSignal>,
}

/// Run state that lives only for the duration of [`AgentLoop::run`]
struct RunState {
    conversation: Conversation,
    usage: UsageTracker,
    system: String,
    definitions: Vec<ToolDefinition>,
}

impl AgentLoop {
    pub(crate) fn new(
        config: AgentConfig,
        client: Arc<dyn LlmClient>,
        tools: ToolExecutor,
        context: Box<dyn ContextStrategy>,
        trajectory: Option<TrajectoryRecorder>,
        stop: Option<StopSignal>,
    ) -> Self {
        Self {
            config,
            client,
            tools,
            context,
            trajectory,
            stop,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Names of the tools this run will offer
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.list_tools()
    }

    /// Where the trajectory is written, if anywhere
    pub fn trajectory_path(&self) -> Option<&Path> {
        self.trajectory.as_ref().and_then(|t| t.file_path())
    }

    /// Run the mission to a terminal status
    pub async fn run<S: Into<String>>(self, mission: S) -> RunOutcome {
        let start = Instant::now();
        let mission = mission.into();
        let max_iterations = self.config.max_iterations;

        tracing::info!(
            "Starting run: model={}, tools=[{}], max_iterations={}, context={}",
            self.client.model_name(),
            self.tools.list_tools().join(", "),
            max_iterations,
            self.context.name()
        );
        tracing::debug!("Mission: {}", mission);

        self.record(TrajectoryEntry::task_start(
            mission.clone(),
            serde_json::to_value(&self.config).unwrap_or_default(),
        ))
        .await;

        let mut run = RunState {
            conversation: Conversation::new(mission),
            usage: UsageTracker::new(self.config.pricing.clone()),
            system: self.config.system_prompt.clone().unwrap_or_default(),
            definitions: self.tools.definitions(),
        };

        let mut state = if max_iterations == 0 {
            tracing::warn!("Iteration ceiling is 0, nothing to do");
            LoopState::Terminated {
                status: RunStatus::Exhausted,
                error: None,
            }
        } else {
            LoopState::AwaitingModelResponse
        };

        let (status, error) = loop {
            state = match state {
                LoopState::AwaitingModelResponse if self.stop_requested() => {
                    let iteration = run.conversation.iterations() + 1;
                    let error = AgentError::Interrupted {
                        message: format!("stopped before iteration {}", iteration),
                    };
                    self.structural_failure(error.into(), "interrupt", iteration).await
                }
                LoopState::AwaitingModelResponse => self.consult(&mut run).await,
                LoopState::AwaitingToolDispatch { calls, step_cost } => {
                    self.dispatch(&mut run, calls, step_cost).await
                }
                LoopState::Terminated { status, error } => break (status, error),
            };
        };

        self.tools.shutdown().await;

        let elapsed = start.elapsed();
        run.usage.finish(elapsed);
        for line in run.usage.summary().lines() {
            tracing::info!("{}", line);
        }

        let duration_ms = elapsed.as_millis() as u64;
        let outcome = run
            .conversation
            .finish(status, error, run.usage, duration_ms);

        tracing::info!(
            "Run {} after {} iteration(s), {} tool call(s)",
            outcome.status,
            outcome.iterations,
            outcome.tool_calls
        );

        self.record(TrajectoryEntry::run_complete(
            outcome.status.to_string(),
            outcome.iterations,
            outcome.tool_calls,
            duration_ms,
            outcome.error.clone(),
        ))
        .await;

        outcome
    }

    /// Ask the model for its next move
    async fn consult(&self, run: &mut RunState) -> LoopState {
        let iteration = run.conversation.iterations() + 1;
        let max_iterations = self.config.max_iterations;
        tracing::info!("--- Iteration {}/{} ---", iteration, max_iterations);

        let payload = self.context.build_payload(run.conversation.messages());
        self.record(TrajectoryEntry::llm_request(
            &payload,
            self.client.model_name(),
            self.client.provider_name(),
            iteration,
        ))
        .await;

        let request = LlmRequest {
            system: run.system.clone(),
            messages: payload,
            tools: run.definitions.clone(),
        };

        let t0 = Instant::now();
        let response = match self.client.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Model request failed at iteration {}: {}", iteration, e);
                self.record(TrajectoryEntry::error(
                    e.to_string(),
                    Some("model request".to_string()),
                    iteration,
                ))
                .await;
                return LoopState::Terminated {
                    status: RunStatus::Failed,
                    error: Some(e.to_string()),
                };
            }
        };
        let api_time = t0.elapsed();

        let step_cost = run
            .usage
            .record(&response.usage.unwrap_or_default(), api_time);

        tracing::info!(
            "Response: stop_reason={}, blocks={}, api={:.1}s",
            response
                .stop_reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".to_string()),
            response.message.content.len(),
            api_time.as_secs_f64()
        );
        tracing::info!(
            "{}",
            run.usage
                .step_summary(iteration, max_iterations, step_cost, api_time)
        );
        log_reply(&response.message);

        if response.stop_reason == Some(StopReason::MaxTokens) {
            tracing::warn!("Reply was cut off at max_tokens");
        }

        self.record(TrajectoryEntry::llm_response(
            response.message.clone(),
            response.usage,
            response.stop_reason.as_ref().map(|r| r.to_string()),
            duration_ms(api_time),
            iteration,
        ))
        .await;

        let calls = response.message.tool_calls();
        if let Err(e) = run.conversation.push_assistant(response.message) {
            return self.structural_failure(e, "transcript", iteration).await;
        }

        if calls.is_empty() {
            run.conversation.complete_round();
            tracing::info!("Agent finished (no tool calls)");
            self.record(TrajectoryEntry::iteration_complete(
                0,
                step_cost,
                run.usage.cost(),
                iteration,
            ))
            .await;
            return LoopState::Terminated {
                status: RunStatus::Completed,
                error: None,
            };
        }

        LoopState::AwaitingToolDispatch { calls, step_cost }
    }

    /// Run every requested tool in order and answer them in one message
    async fn dispatch(
        &self,
        run: &mut RunState,
        calls: Vec<ToolCall>,
        step_cost: f64,
    ) -> LoopState {
        let iteration = run.conversation.iterations() + 1;
        let max_iterations = self.config.max_iterations;

        let mut blocks = Vec::with_capacity(calls.len() + 1);
        for call in &calls {
            tracing::info!("[{}] {}", call.name, describe_arguments(&call.arguments));
            self.record(TrajectoryEntry::tool_call(call.clone(), iteration))
                .await;

            let dispatch = self.tools.dispatch(call).await;
            self.record(TrajectoryEntry::tool_result(&dispatch, iteration))
                .await;

            blocks.push(dispatch.output.into_block(call.id.clone()));
        }

        let completed = run.conversation.complete_round();

        if self.config.budget_notes {
            blocks.push(ContentBlock::text(budget_note(
                completed,
                max_iterations,
                self.config.budget_warning_fraction,
                run.usage.cost(),
            )));
        }

        if let Err(e) = run
            .conversation
            .push_tool_results(LlmMessage::tool_results(blocks))
        {
            return self.structural_failure(e, "transcript", iteration).await;
        }

        self.record(TrajectoryEntry::iteration_complete(
            calls.len(),
            step_cost,
            run.usage.cost(),
            iteration,
        ))
        .await;

        if completed >= max_iterations {
            tracing::warn!("Hit max iterations ({})", max_iterations);
            return LoopState::Terminated {
                status: RunStatus::Exhausted,
                error: None,
            };
        }

        LoopState::AwaitingModelResponse
    }

    async fn structural_failure(&self, error: Error, context: &str, iteration: usize) -> LoopState {
        tracing::error!("{}", error);
        self.record(TrajectoryEntry::error(
            error.to_string(),
            Some(context.to_string()),
            iteration,
        ))
        .await;
        LoopState::Terminated {
            status: RunStatus::Failed,
            error: Some(error.to_string()),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(StopSignal::is_stopped)
    }

    /// Trajectory problems are logged, never fatal
    async fn record(&self, entry: TrajectoryEntry) {
        if let Some(recorder) = &self.trajectory {
            if let Err(e) = recorder.record(entry).await {
                tracing::warn!("Failed to record trajectory entry: {}", e);
            }
        }
    }
}

/// Note appended to each tool-result message so the model can pace itself
pub fn budget_note(
    iteration: usize,
    max_iterations: usize,
    warning_fraction: f64,
    cost: f64,
) -> String {
    let remaining = max_iterations.saturating_sub(iteration);
    let threshold = (max_iterations as f64 * warning_fraction).floor() as usize;
    if remaining <= threshold {
        format!(
            "[{} iterations remaining. Write your results now and stop browsing.]",
            remaining
        )
    } else {
        format!("[Iteration {}/{} - ${:.2} spent]", iteration, max_iterations, cost)
    }
}

fn log_reply(message: &LlmMessage) {
    for block in &message.content {
        match block {
            ContentBlock::Thinking { thinking, .. } => tracing::debug!("[thinking] {}", thinking),
            ContentBlock::Text { text } => tracing::info!("[assistant] {}", text),
            _ => {}
        }
    }
}

fn describe_arguments(arguments: &serde_json::Value) -> String {
    match arguments.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let short: String = value.chars().take(120).collect();
                format!("{}={}", k, short)
            })
            .collect::<Vec<_>>()
            .join(", "),
        None => arguments.to_string(),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
