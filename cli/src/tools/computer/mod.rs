//! Screen, mouse and keyboard control

pub mod backend;
pub mod keys;
pub mod scaling;

pub use backend::{Desktop, MacDesktop, Region};
pub use scaling::{Scaler, ScalingTarget, ScreenSize};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use shopper_core::error::Result;
use shopper_core::llm::ToolDefinition;
use shopper_core::tools::{Tool, ToolCall, ToolFactory, ToolOutput};
use std::sync::Arc;
use std::time::Duration;

/// Provider type of the native computer tool
pub const COMPUTER_TOOL_TYPE: &str = "computer_20251124";

/// Time the screen gets to settle before the follow-up screenshot
pub const SCREENSHOT_DELAY: Duration = Duration::from_secs(2);

/// Longest `wait` the model may ask for
const MAX_WAIT_SECS: f64 = 60.0;

/// Arrow presses per unit of `scroll_amount`
const PRESSES_PER_SCROLL: u32 = 3;

/// Largest `scroll_amount` accepted in one action
const MAX_SCROLL_AMOUNT: u32 = 50;

const ACTIONS: &[&str] = &[
    "key",
    "type",
    "mouse_move",
    "left_click",
    "left_click_drag",
    "right_click",
    "middle_click",
    "double_click",
    "triple_click",
    "screenshot",
    "cursor_position",
    "left_mouse_down",
    "left_mouse_up",
    "scroll",
    "hold_key",
    "wait",
    "zoom",
];

/// Drives the desktop on behalf of the model
///
/// Every action except `screenshot`, `cursor_position` and `zoom` waits for
/// the screen to settle and returns a fresh screenshot.
pub struct ComputerTool {
    desktop: Arc<dyn Desktop>,
    scaler: Scaler,
    settle: Duration,
}

impl ComputerTool {
    pub fn new(desktop: Arc<dyn Desktop>, scaler: Scaler) -> Self {
        Self {
            desktop,
            scaler,
            settle: SCREENSHOT_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle = delay;
        self
    }

    /// Scaled screenshot as base64 PNG
    async fn screenshot(&self) -> Result<String> {
        let resize = self.scaler.target().map(|t| t.size);
        let png = self.desktop.capture(None, resize).await?;
        Ok(STANDARD.encode(png))
    }

    /// Run input commands, then report with a screenshot
    async fn act(&self, commands: Vec<String>, text: impl Into<String>) -> Result<ToolOutput> {
        self.desktop.send(&commands).await?;
        self.settled_screenshot(text).await
    }

    async fn settled_screenshot(&self, text: impl Into<String>) -> Result<ToolOutput> {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(ToolOutput::ok(text).with_image(self.screenshot().await?))
    }

    /// Read a model coordinate argument and map it onto the screen
    fn point(
        &self,
        call: &ToolCall,
        key: &str,
    ) -> std::result::Result<Option<(i64, i64)>, String> {
        let raw: Option<Vec<i64>> = call
            .get_optional(key)
            .map_err(|_| format!("{} must be [x, y]", key))?;
        match raw.as_deref() {
            None => Ok(None),
            Some([x, y]) => self.scaler.to_screen(*x, *y).map(Some),
            Some(_) => Err(format!("{} must be [x, y]", key)),
        }
    }

    fn text(call: &ToolCall) -> std::result::Result<Option<String>, String> {
        call.get_optional("text")
            .map_err(|_| "text must be a string".to_string())
    }

    fn click(&self, call: &ToolCall, verb: &str) -> std::result::Result<Vec<String>, String> {
        let at = match self.point(call, "coordinate")? {
            Some((x, y)) => format!("{},{}", x, y),
            None => ".".to_string(),
        };
        let modifiers = match Self::text(call)? {
            Some(text) => keys::modifier_list(&text)?,
            None => Vec::new(),
        };

        let mut commands = Vec::new();
        if !modifiers.is_empty() {
            commands.push(format!("kd:{}", modifiers.join(",")));
        }
        commands.push(format!("{}:{}", verb, at));
        if !modifiers.is_empty() {
            commands.push(format!("ku:{}", modifiers.join(",")));
        }
        Ok(commands)
    }

    async fn run_action(&self, action: &str, call: &ToolCall) -> Result<ToolOutput> {
        let commands = match action {
            "screenshot" => return Ok(ToolOutput::image(self.screenshot().await?)),

            "cursor_position" => {
                let (x, y) = self.desktop.pointer().await?;
                let (ax, ay) = self.scaler.to_api(x, y);
                return Ok(ToolOutput::ok(format!("X={},Y={}", ax, ay)));
            }

            "key" => match Self::text(call) {
                Ok(Some(text)) => keys::combo_commands(&text),
                Ok(None) => Err("text is required for key".to_string()),
                Err(e) => Err(e),
            },

            "type" => match Self::text(call) {
                Ok(Some(text)) => Ok(keys::type_commands(&text)),
                Ok(None) => Err("text is required for type".to_string()),
                Err(e) => Err(e),
            },

            "mouse_move" => match (Self::text(call), self.point(call, "coordinate")) {
                (Ok(Some(_)), _) => Err("Text is not supported for mouse move".to_string()),
                (_, Ok(Some((x, y)))) => Ok(vec![format!("m:{},{}", x, y)]),
                (_, Ok(None)) => Err("Coordinate is required for mouse move".to_string()),
                (_, Err(e)) => Err(e),
            },

            "left_click" => self.click(call, "c"),
            "right_click" => self.click(call, "rc"),
            "double_click" => self.click(call, "dc"),
            "triple_click" => self.click(call, "tc"),
            "middle_click" => Err("middle_click is not supported on macOS".to_string()),

            "left_click_drag" => {
                match (
                    self.point(call, "start_coordinate"),
                    self.point(call, "coordinate"),
                ) {
                    (Ok(Some((x0, y0))), Ok(Some((x1, y1)))) => Ok(vec![
                        format!("dd:{},{}", x0, y0),
                        format!("dm:{},{}", x1, y1),
                        format!("du:{},{}", x1, y1),
                    ]),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                    _ => Err(
                        "start_coordinate and coordinate are required for left_click_drag"
                            .to_string(),
                    ),
                }
            }

            "left_mouse_down" => Ok(vec!["dd:.".to_string()]),
            "left_mouse_up" => Ok(vec!["du:.".to_string()]),

            "scroll" => self.scroll(call),

            "hold_key" => {
                let duration: f64 = call.get_optional("duration")?.unwrap_or(1.0);
                match Self::text(call) {
                    Ok(Some(text)) => keys::modifier_list(&text).map(|mods| {
                        let held = mods.join(",");
                        vec![
                            format!("kd:{}", held),
                            format!("w:{}", (duration.clamp(0.0, MAX_WAIT_SECS) * 1000.0) as u64),
                            format!("ku:{}", held),
                        ]
                    }),
                    Ok(None) => Err("text is required for hold_key".to_string()),
                    Err(e) => Err(e),
                }
            }

            "wait" => {
                let duration: f64 = call.get_optional("duration")?.unwrap_or(1.0);
                if !(0.0..=MAX_WAIT_SECS).contains(&duration) {
                    return Ok(ToolOutput::error(format!(
                        "duration must be between 0 and {} seconds",
                        MAX_WAIT_SECS
                    )));
                }
                tokio::time::sleep(Duration::from_secs_f64(duration)).await;
                return self.settled_screenshot("").await;
            }

            "zoom" => return self.zoom(call).await,

            other => Err(format!(
                "Unknown action '{}'. Expected one of: {}",
                other,
                ACTIONS.join(", ")
            )),
        };

        match commands {
            Ok(commands) => self.act(commands, "").await,
            Err(message) => Ok(ToolOutput::error(message)),
        }
    }

    /// Scrolling is emulated with arrow keys after moving over the target
    fn scroll(&self, call: &ToolCall) -> std::result::Result<Vec<String>, String> {
        let direction: String = call
            .get_optional("scroll_direction")
            .map_err(|_| "scroll_direction must be a string".to_string())?
            .ok_or("scroll_direction is required for scroll")?;
        let amount: u32 = call
            .get_optional("scroll_amount")
            .map_err(|_| "scroll_amount must be a non-negative integer".to_string())?
            .unwrap_or(3);
        if amount > MAX_SCROLL_AMOUNT {
            return Err(format!(
                "scroll_amount must be at most {}, got {}",
                MAX_SCROLL_AMOUNT, amount
            ));
        }
        let presses = amount
            .checked_mul(PRESSES_PER_SCROLL)
            .ok_or("scroll_amount is too large")?;

        let arrow = match direction.as_str() {
            "up" => "arrow-up",
            "down" => "arrow-down",
            "left" => "arrow-left",
            "right" => "arrow-right",
            other => return Err(format!("invalid scroll_direction '{}'", other)),
        };

        let mut commands = Vec::new();
        if let Some((x, y)) = self.point(call, "coordinate")? {
            commands.push(format!("m:{},{}", x, y));
        }
        commands.extend((0..presses).map(|_| format!("kp:{}", arrow)));
        Ok(commands)
    }

    /// Capture one region of the screen at full resolution
    async fn zoom(&self, call: &ToolCall) -> Result<ToolOutput> {
        let region: Option<Vec<i64>> = call.get_optional("region")?;
        let [x0, y0, x1, y1] = match region.as_deref() {
            Some(&[x0, y0, x1, y1]) if x1 > x0 && y1 > y0 => [x0, y0, x1, y1],
            _ => {
                return Ok(ToolOutput::error(
                    "region must be [x0, y0, x1, y1] with x1 > x0 and y1 > y0",
                ))
            }
        };

        let (top_left, bottom_right) = match (
            self.scaler.to_screen(x0, y0),
            self.scaler.to_screen(x1, y1),
        ) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return Ok(ToolOutput::error(e)),
        };

        let region = Region {
            x: top_left.0,
            y: top_left.1,
            width: bottom_right.0 - top_left.0,
            height: bottom_right.1 - top_left.1,
        };
        let png = self.desktop.capture(Some(region), None).await?;
        Ok(ToolOutput::image(STANDARD.encode(png)))
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn description(&self) -> &str {
        "Control the screen, mouse and keyboard. Every action returns a screenshot of the result."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ACTIONS},
                "text": {"type": "string"},
                "coordinate": {"type": "array", "items": {"type": "integer"}},
                "start_coordinate": {"type": "array", "items": {"type": "integer"}},
                "scroll_direction": {"type": "string", "enum": ["up", "down", "left", "right"]},
                "scroll_amount": {"type": "integer"},
                "duration": {"type": "number"},
                "region": {"type": "array", "items": {"type": "integer"}}
            },
            "required": ["action"]
        })
    }

    fn definition(&self) -> ToolDefinition {
        let size = self.scaler.api_size();
        let mut options = serde_json::Map::new();
        options.insert("display_width_px".to_string(), json!(size.width));
        options.insert("display_height_px".to_string(), json!(size.height));
        ToolDefinition::Builtin {
            tool_type: COMPUTER_TOOL_TYPE.to_string(),
            name: self.name().to_string(),
            options,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput> {
        let action: String = call.get_parameter("action")?;
        self.run_action(&action, call).await
    }
}

/// Creates computer tools that share one desktop backend
pub struct ComputerToolFactory {
    desktop: Arc<dyn Desktop>,
    scaler: Scaler,
}

impl ComputerToolFactory {
    pub fn new(desktop: Arc<dyn Desktop>, scaler: Scaler) -> Self {
        Self { desktop, scaler }
    }

    /// Ask the desktop for its size and pick the scaling target
    pub async fn detect(desktop: Arc<dyn Desktop>) -> Result<Self> {
        let screen = desktop.screen_size().await?;
        let scaler = Scaler::new(screen);
        match scaler.target() {
            Some(target) => tracing::info!(
                "Display {} -> screenshots at {} ({}, {})",
                screen,
                target.size,
                target.name,
                target.description
            ),
            None => tracing::info!("Display {} -> screenshots unscaled", screen),
        }
        Ok(Self::new(desktop, scaler))
    }
}

impl ToolFactory for ComputerToolFactory {
    fn create(&self) -> Box<dyn Tool> {
        Box::new(ComputerTool::new(self.desktop.clone(), self.scaler))
    }

    fn tool_name(&self) -> &str {
        "computer"
    }

    fn tool_description(&self) -> &str {
        "Screenshots plus mouse and keyboard control of the desktop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records input commands and hands back a fixed image
    #[derive(Default)]
    struct FakeDesktop {
        sent: Mutex<Vec<String>>,
        captures: Mutex<Vec<(Option<Region>, Option<ScreenSize>)>>,
    }

    #[async_trait]
    impl Desktop for FakeDesktop {
        async fn screen_size(&self) -> Result<ScreenSize> {
            Ok(ScreenSize::new(1470, 956))
        }

        async fn capture(
            &self,
            region: Option<Region>,
            resize: Option<ScreenSize>,
        ) -> Result<Vec<u8>> {
            self.captures.lock().unwrap().push((region, resize));
            Ok(b"png".to_vec())
        }

        async fn pointer(&self) -> Result<(i64, i64)> {
            Ok((735, 478))
        }

        async fn send(&self, commands: &[String]) -> Result<()> {
            self.sent.lock().unwrap().extend_from_slice(commands);
            Ok(())
        }
    }

    async fn tool() -> (ComputerTool, Arc<FakeDesktop>) {
        let desktop = Arc::new(FakeDesktop::default());
        let factory = ComputerToolFactory::detect(desktop.clone()).await.unwrap();
        let tool = ComputerTool::new(factory.desktop.clone(), factory.scaler)
            .with_settle_delay(Duration::ZERO);
        (tool, desktop)
    }

    async fn run(tool: &ComputerTool, args: serde_json::Value) -> ToolOutput {
        tool.execute(&ToolCall::new("computer", args)).await.unwrap()
    }

    #[tokio::test]
    async fn test_definition_reports_scaled_size() {
        let (tool, _) = tool().await;
        match tool.definition() {
            ToolDefinition::Builtin { tool_type, options, .. } => {
                assert_eq!(tool_type, COMPUTER_TOOL_TYPE);
                assert_eq!(options["display_width_px"], 1024);
                assert_eq!(options["display_height_px"], 666);
            }
            other => panic!("unexpected definition: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_screenshot_is_resized() {
        let (tool, desktop) = tool().await;
        let output = run(&tool, json!({"action": "screenshot"})).await;
        assert_eq!(output.image.as_deref(), Some(STANDARD.encode(b"png").as_str()));
        assert_eq!(
            desktop.captures.lock().unwrap()[0],
            (None, Some(ScreenSize::new(1024, 666)))
        );
    }

    #[tokio::test]
    async fn test_click_scales_coordinates_and_screenshots() {
        let (tool, desktop) = tool().await;
        let output = run(&tool, json!({"action": "left_click", "coordinate": [512, 333]})).await;
        assert!(!output.is_error);
        assert!(output.image.is_some());
        assert_eq!(*desktop.sent.lock().unwrap(), vec!["c:735,478"]);
    }

    #[tokio::test]
    async fn test_click_with_modifier() {
        let (tool, desktop) = tool().await;
        run(&tool, json!({"action": "left_click", "text": "super"})).await;
        assert_eq!(*desktop.sent.lock().unwrap(), vec!["kd:cmd", "c:.", "ku:cmd"]);
    }

    #[tokio::test]
    async fn test_key_combo() {
        let (tool, desktop) = tool().await;
        run(&tool, json!({"action": "key", "text": "super+space"})).await;
        assert_eq!(
            *desktop.sent.lock().unwrap(),
            vec!["kd:cmd", "kp:space", "ku:cmd"]
        );
    }

    #[tokio::test]
    async fn test_invalid_input_sends_nothing() {
        let (tool, desktop) = tool().await;

        let out_of_bounds =
            run(&tool, json!({"action": "mouse_move", "coordinate": [5000, 10]})).await;
        assert!(out_of_bounds.is_error);
        assert!(out_of_bounds.text.contains("out of bounds"));

        let missing = run(&tool, json!({"action": "mouse_move"})).await;
        assert_eq!(missing.text, "Coordinate is required for mouse move");

        let bad_key = run(&tool, json!({"action": "key", "text": "notarealkey"})).await;
        assert!(bad_key.text.contains("unrecognized"));

        let unknown = run(&tool, json!({"action": "dance"})).await;
        assert!(unknown.text.starts_with("Unknown action 'dance'"));

        assert!(desktop.sent.lock().unwrap().is_empty());
        assert!(desktop.captures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_position_in_model_space() {
        let (tool, _) = tool().await;
        let output = run(&tool, json!({"action": "cursor_position"})).await;
        assert_eq!(output.text, "X=512,Y=333");
        assert!(output.image.is_none());
    }

    #[tokio::test]
    async fn test_scroll_uses_arrow_keys() {
        let (tool, desktop) = tool().await;
        run(
            &tool,
            json!({"action": "scroll", "coordinate": [512, 333], "scroll_direction": "down", "scroll_amount": 1}),
        )
        .await;
        assert_eq!(
            *desktop.sent.lock().unwrap(),
            vec!["m:735,478", "kp:arrow-down", "kp:arrow-down", "kp:arrow-down"]
        );
    }

    #[tokio::test]
    async fn test_scroll_amount_is_bounded() {
        let (tool, desktop) = tool().await;

        let output = run(
            &tool,
            json!({"action": "scroll", "scroll_direction": "down", "scroll_amount": 2000000}),
        )
        .await;
        assert!(output.is_error);
        assert!(output.text.contains("at most 50"));

        let output = run(
            &tool,
            json!({"action": "scroll", "scroll_direction": "up", "scroll_amount": 2000000000u32}),
        )
        .await;
        assert!(output.is_error);
        assert!(desktop.sent.lock().unwrap().is_empty());

        let output = run(
            &tool,
            json!({"action": "scroll", "scroll_direction": "up", "scroll_amount": 50}),
        )
        .await;
        assert!(!output.is_error);
        assert_eq!(desktop.sent.lock().unwrap().len(), 150);
    }

    #[tokio::test]
    async fn test_drag() {
        let (tool, desktop) = tool().await;
        run(
            &tool,
            json!({"action": "left_click_drag", "start_coordinate": [0, 0], "coordinate": [512, 333]}),
        )
        .await;
        assert_eq!(
            *desktop.sent.lock().unwrap(),
            vec!["dd:0,0", "dm:735,478", "du:735,478"]
        );
    }

    #[tokio::test]
    async fn test_zoom_captures_region_unscaled() {
        let (tool, desktop) = tool().await;
        let output = run(&tool, json!({"action": "zoom", "region": [0, 0, 512, 333]})).await;
        assert!(output.image.is_some());
        assert_eq!(
            desktop.captures.lock().unwrap()[0],
            (
                Some(Region { x: 0, y: 0, width: 735, height: 478 }),
                None
            )
        );
    }
}
