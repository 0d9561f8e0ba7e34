//! Per-run tool dispatch

use crate::error::{Result, ToolError};
use crate::llm::ToolDefinition;
use crate::tools::schema::validate_arguments;
use crate::tools::{Tool, ToolCall, ToolOutput};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Outcome of dispatching one tool call
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// The call as the model issued it
    pub call: ToolCall,

    /// What goes back to the model
    pub output: ToolOutput,

    /// Wall time spent in the tool
    pub duration_ms: u64,
}

/// Tool instances for a single run, keyed by name
///
/// Registration order is kept so tool definitions reach the model in a
/// stable order.
#[derive(Default)]
pub struct ToolExecutor {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolExecutor {
    /// Create an empty executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique within a run
    pub fn register_tool(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate { name }.into());
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Names of all registered tools, in registration order
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve and run one call
    ///
    /// Never fails: unknown tools, invalid arguments, tool errors and tool
    /// panics all come back as error-flagged output.
    pub async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let start = Instant::now();
        let output = self.run(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if output.is_error {
            tracing::warn!(
                "  {} -> error ({}ms): {}",
                call.name,
                duration_ms,
                output.preview(200)
            );
        } else {
            tracing::info!(
                "  {} -> ok ({}ms): {}",
                call.name,
                duration_ms,
                output.preview(200)
            );
        }

        Dispatch {
            call: call.clone(),
            output,
            duration_ms,
        }
    }

    async fn run(&self, call: &ToolCall) -> ToolOutput {
        let Some(tool) = self.get_tool(&call.name) else {
            return ToolOutput::error(format!(
                "Unknown tool: {}. Available tools: {}",
                call.name,
                self.list_tools().join(", ")
            ));
        };

        if let Err(reason) = validate_arguments(&tool.input_schema(), &call.arguments) {
            return ToolOutput::error(format!(
                "Invalid arguments for tool '{}': {}",
                call.name, reason
            ));
        }

        match AssertUnwindSafe(tool.execute(call)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => ToolOutput::error(format!("Tool '{}' failed: {}", call.name, e)),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Tool '{}' panicked: {}", call.name, message);
                ToolOutput::error(format!("Tool '{}' crashed: {}", call.name, message))
            }
        }
    }

    /// Release every tool's resources
    pub async fn shutdown(&self) {
        for tool in &self.tools {
            tool.shutdown().await;
        }
    }
}
