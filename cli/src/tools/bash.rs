//! Persistent bash session tool

use async_trait::async_trait;
use serde_json::json;
use shopper_core::error::Result;
use shopper_core::llm::ToolDefinition;
use shopper_core::tools::utils::maybe_truncate;
use shopper_core::tools::{Tool, ToolCall, ToolFactory, ToolOutput};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

/// Provider type of the native bash tool
pub const BASH_TOOL_TYPE: &str = "bash_20250124";

/// Default per-command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One long-lived `/bin/bash` process
///
/// stderr is folded into stdout when the session starts, so a single reader
/// sees everything up to the end-of-command marker.
struct ShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ShellSession {
    async fn start(working_dir: Option<&Path>) -> Result<Self> {
        let mut cmd = Command::new("/bin/bash");
        cmd.args(["--norc", "--noprofile"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        let mut stdin = child.stdin.take().ok_or("bash stdin unavailable")?;
        let stdout = child.stdout.take().ok_or("bash stdout unavailable")?;

        stdin.write_all(b"exec 2>&1\n").await?;
        stdin.flush().await?;

        tracing::debug!("Started bash session (pid {:?})", child.id());
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("bash session already gone: {}", e);
        }
    }

    /// Run one command and collect its combined output and exit status
    async fn run(&mut self, command: &str) -> Result<(i32, String)> {
        let marker = format!("__SENTINEL_{}__", Uuid::new_v4().simple());
        let script = format!(
            "{{ {}\n}}\nprintf '\\n%s %s\\n' '{}' \"$?\"\n",
            command, marker
        );
        self.stdin.write_all(script.as_bytes()).await?;
        self.stdin.flush().await?;

        let mut output = String::new();
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            if self.stdout.read_until(b'\n', &mut buffer).await? == 0 {
                return Err("bash exited before the command finished".into());
            }
            let line = String::from_utf8_lossy(&buffer);
            if let Some(rest) = line.strip_prefix(marker.as_str()) {
                let code = rest.trim().parse().unwrap_or(-1);
                return Ok((code, output.trim().to_string()));
            }
            output.push_str(&line);
        }
    }
}

/// Runs commands in a bash session that keeps state between calls
pub struct BashTool {
    session: Mutex<Option<ShellSession>>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Start sessions in `dir`
    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn restart(&self) -> Result<ToolOutput> {
        let mut guard = self.session.lock().await;
        if let Some(old) = guard.take() {
            old.stop().await;
        }
        *guard = Some(ShellSession::start(self.working_dir.as_deref()).await?);
        Ok(ToolOutput::ok("Bash session restarted."))
    }

    async fn run_command(&self, command: &str) -> Result<ToolOutput> {
        let mut guard = self.session.lock().await;

        let alive = guard.as_mut().map(|s| s.is_alive()).unwrap_or(false);
        if !alive {
            if guard.is_some() {
                tracing::warn!("bash session died, starting a new one");
            }
            *guard = Some(ShellSession::start(self.working_dir.as_deref()).await?);
        }
        let session = guard.as_mut().ok_or("no bash session")?;

        match timeout(self.timeout, session.run(command)).await {
            Ok(Ok((code, output))) => {
                let mut text = maybe_truncate(&output, None);
                if code != 0 {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format!("[exit code {}]", code));
                }
                Ok(ToolOutput::ok(text))
            }
            Ok(Err(e)) => {
                if let Some(dead) = guard.take() {
                    dead.stop().await;
                }
                Ok(ToolOutput::error(format!("Error running bash command: {}", e)))
            }
            Err(_) => {
                // A hung command leaves the pipe mid-stream; the next call starts clean
                if let Some(hung) = guard.take() {
                    hung.stop().await;
                }
                Ok(ToolOutput::error(format!(
                    "Command timed out after {} seconds. The bash session was reset, so shell state is lost.",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run commands in a bash shell\n\
         * State is persistent across command calls.\n\
         * stdout and stderr are returned together.\n\
         * Please avoid commands that may produce a very large amount of output.\n\
         * Set restart to true to get a fresh session."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to run."
                },
                "restart": {
                    "type": "boolean",
                    "description": "Set to true to restart the shell session."
                }
            }
        })
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::Builtin {
            tool_type: BASH_TOOL_TYPE.to_string(),
            name: self.name().to_string(),
            options: serde_json::Map::new(),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput> {
        if call.get_optional::<bool>("restart")?.unwrap_or(false) {
            return self.restart().await;
        }

        match call.get_optional::<String>("command")? {
            Some(command) => self.run_command(&command).await,
            None => Ok(ToolOutput::error(
                "Either command or restart must be provided",
            )),
        }
    }

    async fn shutdown(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.stop().await;
        }
    }
}

/// Creates bash tools rooted at a working directory
pub struct BashToolFactory {
    working_dir: Option<PathBuf>,
}

impl BashToolFactory {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self { working_dir }
    }
}

impl ToolFactory for BashToolFactory {
    fn create(&self) -> Box<dyn Tool> {
        let tool = BashTool::new();
        Box::new(match &self.working_dir {
            Some(dir) => tool.with_working_dir(dir),
            None => tool,
        })
    }

    fn tool_name(&self) -> &str {
        "bash"
    }

    fn tool_description(&self) -> &str {
        "Run commands in a persistent bash session"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("bash", args)
    }

    #[tokio::test]
    async fn test_echo() {
        let tool = BashTool::new();
        let output = tool
            .execute(&call(json!({"command": "echo hello"})))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.text, "hello");
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_state_persists_between_calls() {
        let dir = TempDir::new().unwrap();
        let tool = BashTool::new().with_working_dir(dir.path());

        tool.execute(&call(json!({"command": "export ITEM=lamp; mkdir sub; cd sub"})))
            .await
            .unwrap();
        let output = tool
            .execute(&call(json!({"command": "echo $ITEM; basename $(pwd)"})))
            .await
            .unwrap();
        assert_eq!(output.text, "lamp\nsub");
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_stderr_and_exit_code() {
        let tool = BashTool::new();
        let output = tool
            .execute(&call(json!({"command": "echo oops >&2; false"})))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert!(output.text.contains("oops"));
        assert!(output.text.ends_with("[exit code 1]"));
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_clears_state() {
        let tool = BashTool::new();
        tool.execute(&call(json!({"command": "export ITEM=lamp"})))
            .await
            .unwrap();

        let restarted = tool.execute(&call(json!({"restart": true}))).await.unwrap();
        assert_eq!(restarted.text, "Bash session restarted.");

        let output = tool
            .execute(&call(json!({"command": "echo \"[$ITEM]\""})))
            .await
            .unwrap();
        assert_eq!(output.text, "[]");
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_resets_session() {
        let tool = BashTool::new().with_timeout(Duration::from_millis(300));
        let output = tool
            .execute(&call(json!({"command": "sleep 5"})))
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.text.contains("timed out"));

        let output = tool
            .execute(&call(json!({"command": "echo back"})))
            .await
            .unwrap();
        assert_eq!(output.text, "back");
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_exit_starts_new_session() {
        let tool = BashTool::new();
        let output = tool.execute(&call(json!({"command": "exit 3"}))).await.unwrap();
        assert!(output.is_error);

        let output = tool
            .execute(&call(json!({"command": "echo alive"})))
            .await
            .unwrap();
        assert_eq!(output.text, "alive");
        tool.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_command() {
        let tool = BashTool::new();
        let output = tool.execute(&call(json!({}))).await.unwrap();
        assert!(output.is_error);
    }

    #[test]
    fn test_definition_is_builtin() {
        match BashTool::new().definition() {
            ToolDefinition::Builtin { tool_type, name, .. } => {
                assert_eq!(tool_type, BASH_TOOL_TYPE);
                assert_eq!(name, "bash");
            }
            other => panic!("unexpected definition: {:?}", other),
        }
    }
}
