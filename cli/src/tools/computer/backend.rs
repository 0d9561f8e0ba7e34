//! Screen and input backends for the computer tool

use super::scaling::ScreenSize;
use async_trait::async_trait;
use shopper_core::error::{Result, ToolError};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Longest any helper binary may run before it is killed
const HELPER_TIMEOUT: Duration = Duration::from_secs(20);

/// A rectangle on the screen, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// The machine the agent drives
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Logical size of the screen input events are addressed in
    async fn screen_size(&self) -> Result<ScreenSize>;

    /// Capture the screen (or a region of it) as PNG bytes, optionally resized
    async fn capture(&self, region: Option<Region>, resize: Option<ScreenSize>) -> Result<Vec<u8>>;

    /// Current pointer position in screen coordinates
    async fn pointer(&self) -> Result<(i64, i64)>;

    /// Run input commands in `cliclick` syntax
    async fn send(&self, commands: &[String]) -> Result<()>;
}

/// macOS backend built on `screencapture`, `sips` and `cliclick`
pub struct MacDesktop {
    display: Option<u32>,
    cliclick: PathBuf,
}

impl MacDesktop {
    /// Locate the helper binaries; `display` is 1-indexed
    pub fn new(display: Option<u32>) -> Result<Self> {
        for helper in ["screencapture", "sips"] {
            which::which(helper).map_err(|_| ToolError::ExecutionFailed {
                name: "computer".to_string(),
                message: format!("{} not found; the computer tool needs macOS", helper),
            })?;
        }
        let cliclick = which::which("cliclick").map_err(|_| ToolError::ExecutionFailed {
            name: "computer".to_string(),
            message: "cliclick not found on PATH (brew install cliclick)".to_string(),
        })?;

        Ok(Self { display, cliclick })
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<String> {
        run_helper(program, args, HELPER_TIMEOUT).await
    }
}

/// Run a helper to completion, killing it once `limit` has passed
async fn run_helper(program: &str, args: &[String], limit: Duration) -> Result<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            tracing::warn!("{} still running after {:?}, killed", program, limit);
            return Err(ToolError::Timeout {
                name: "computer".to_string(),
            }
            .into());
        }
    };

    if !output.status.success() {
        return Err(ToolError::ExecutionFailed {
            name: "computer".to_string(),
            message: format!(
                "{} failed: {}",
                program,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl Desktop for MacDesktop {
    async fn screen_size(&self) -> Result<ScreenSize> {
        let json = self
            .output(
                "system_profiler",
                &["SPDisplaysDataType".to_string(), "-json".to_string()],
            )
            .await?;
        parse_display_size(&json, self.display).ok_or_else(|| {
            ToolError::ExecutionFailed {
                name: "computer".to_string(),
                message: format!(
                    "could not determine the size of display {}",
                    self.display.map(|d| d.to_string()).unwrap_or_else(|| "main".to_string())
                ),
            }
            .into()
        })
    }

    async fn capture(&self, region: Option<Region>, resize: Option<ScreenSize>) -> Result<Vec<u8>> {
        let file = tempfile::Builder::new()
            .prefix("shopper-screen-")
            .suffix(".png")
            .tempfile()?;
        let path = file.path().to_string_lossy().into_owned();

        let mut args = vec!["-x".to_string()];
        if let Some(display) = self.display {
            args.push(format!("-D{}", display));
        }
        if let Some(r) = region {
            args.push(format!("-R{},{},{},{}", r.x, r.y, r.width, r.height));
        }
        args.push(path.clone());
        self.output("screencapture", &args).await?;

        if let Some(size) = resize {
            self.output(
                "sips",
                &[
                    "-z".to_string(),
                    size.height.to_string(),
                    size.width.to_string(),
                    path.clone(),
                ],
            )
            .await?;
        }

        Ok(tokio::fs::read(file.path()).await?)
    }

    async fn pointer(&self) -> Result<(i64, i64)> {
        let out = self
            .output(&self.cliclick.to_string_lossy(), &["p".to_string()])
            .await?;
        parse_point(&out)
            .ok_or_else(|| format!("unexpected cliclick output: {}", out.trim()).into())
    }

    async fn send(&self, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        tracing::debug!("cliclick {}", commands.join(" "));
        self.output(&self.cliclick.to_string_lossy(), commands).await?;
        Ok(())
    }
}

/// Pull the logical resolution out of `system_profiler SPDisplaysDataType -json`
///
/// `_spdisplays_resolution` reads like `1470 x 956 @ 60.00Hz`; without a
/// display number the main display is used.
fn parse_display_size(json: &str, display: Option<u32>) -> Option<ScreenSize> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let screens: Vec<&serde_json::Value> = value
        .get("SPDisplaysDataType")?
        .as_array()?
        .iter()
        .filter_map(|gpu| gpu.get("spdisplays_ndrvs")?.as_array())
        .flatten()
        .collect();

    let screen = match display {
        Some(n) => *screens.get((n as usize).checked_sub(1)?)?,
        None => screens
            .iter()
            .find(|s| s.get("spdisplays_main").and_then(|m| m.as_str()) == Some("spdisplays_yes"))
            .or_else(|| screens.first())
            .copied()?,
    };

    let resolution = screen.get("_spdisplays_resolution")?.as_str()?;
    let mut numbers = resolution
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>());
    let width = numbers.next()?.ok()?;
    let height = numbers.next()?.ok()?;
    Some(ScreenSize::new(width, height))
}

/// Parse `x,y` as printed by `cliclick p`
fn parse_point(text: &str) -> Option<(i64, i64)> {
    let (x, y) = text.trim().split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopper_core::error::Error;
    use std::time::Instant;

    const PROFILER: &str = r#"{
      "SPDisplaysDataType": [{
        "sppci_model": "Apple M2",
        "spdisplays_ndrvs": [
          {"_name": "Color LCD", "_spdisplays_resolution": "1470 x 956 @ 60.00Hz", "spdisplays_main": "spdisplays_yes"},
          {"_name": "DELL", "_spdisplays_resolution": "2560 x 1440 @ 60.00Hz"}
        ]
      }]
    }"#;

    #[test]
    fn test_parse_main_display() {
        assert_eq!(parse_display_size(PROFILER, None), Some(ScreenSize::new(1470, 956)));
    }

    #[test]
    fn test_parse_numbered_display() {
        assert_eq!(parse_display_size(PROFILER, Some(2)), Some(ScreenSize::new(2560, 1440)));
        assert_eq!(parse_display_size(PROFILER, Some(3)), None);
        assert_eq!(parse_display_size(PROFILER, Some(0)), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_display_size("not json", None), None);
        assert_eq!(parse_display_size("{}", None), None);
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("512,300\n"), Some((512, 300)));
        assert_eq!(parse_point("oops"), None);
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_output_and_failure() {
        let out = run_helper("sh", &sh("echo 512,300"), HELPER_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(parse_point(&out), Some((512, 300)));

        let err = run_helper("sh", &sh("echo denied >&2; exit 1"), HELPER_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("denied"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_helper_times_out() {
        let started = Instant::now();
        let err = run_helper("sleep", &["30".to_string()], Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::Timeout { ref name }) if name == "computer"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
