//! Tool registry for building per-run tool sets

use crate::error::{Result, ToolError};
use crate::tools::{Tool, ToolExecutor};
use std::collections::BTreeMap;

/// Factory trait for creating tools
///
/// Every run gets fresh instances, so no resource is shared between runs.
pub trait ToolFactory: Send + Sync {
    /// Create a new instance of the tool
    fn create(&self) -> Box<dyn Tool>;

    /// Get the name of the tool this factory creates
    fn tool_name(&self) -> &str;

    /// Get the description of the tool this factory creates
    fn tool_description(&self) -> &str;
}

/// Registry for managing tool creation
#[derive(Default)]
pub struct ToolRegistry {
    factories: BTreeMap<String, Box<dyn ToolFactory>>,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool factory
    pub fn register_factory(&mut self, factory: Box<dyn ToolFactory>) {
        self.factories
            .insert(factory.tool_name().to_string(), factory);
    }

    /// Create a tool by name
    pub fn create_tool(&self, name: &str) -> Option<Box<dyn Tool>> {
        self.factories.get(name).map(|factory| factory.create())
    }

    /// List all available tool names
    pub fn list_tools(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Get tool name and description
    pub fn get_tool_info(&self, name: &str) -> Option<(&str, &str)> {
        self.factories
            .get(name)
            .map(|factory| (factory.tool_name(), factory.tool_description()))
    }

    /// Build an executor holding fresh instances of the named tools
    pub fn create_executor(&self, tool_names: &[String]) -> Result<ToolExecutor> {
        let mut executor = ToolExecutor::new();

        for name in tool_names {
            let tool = self
                .create_tool(name)
                .ok_or_else(|| ToolError::NotFound { name: name.clone() })?;
            executor.register_tool(tool)?;
        }

        Ok(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolCall, ToolOutput};
    use async_trait::async_trait;

    struct NoopTool;

    impl NoopTool {
        fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolOutput> {
            Ok(ToolOutput::ok("nothing happened"))
        }
    }

    struct NoopToolFactory;

    impl ToolFactory for NoopToolFactory {
        fn create(&self) -> Box<dyn Tool> {
            Box::new(NoopTool::new())
        }

        fn tool_name(&self) -> &str {
            "noop"
        }

        fn tool_description(&self) -> &str {
            "Does nothing"
        }
    }

    #[test]
    fn test_create_executor_with_known_tools() {
        let mut registry = ToolRegistry::new();
        registry.register_factory(Box::new(NoopToolFactory));

        assert_eq!(registry.list_tools(), vec!["noop"]);
        assert_eq!(registry.get_tool_info("noop"), Some(("noop", "Does nothing")));

        let executor = registry.create_executor(&["noop".to_string()]).unwrap();
        assert_eq!(executor.list_tools(), vec!["noop"]);
    }

    #[test]
    fn test_create_executor_rejects_unknown_and_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register_factory(Box::new(NoopToolFactory));

        assert!(registry.create_executor(&["missing".to_string()]).is_err());
        assert!(registry
            .create_executor(&["noop".to_string(), "noop".to_string()])
            .is_err());
    }
}
