//! CLI tool registry

use crate::tools::{BashToolFactory, ComputerToolFactory, EditToolFactory};
use shopper_core::tools::ToolRegistry;
use std::path::Path;

/// Create the registry of shopping tools
///
/// The computer tool needs a detected display, so it is only registered
/// when a factory for it is supplied.
pub fn create_cli_tool_registry(
    working_dir: &Path,
    computer: Option<ComputerToolFactory>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if let Some(factory) = computer {
        registry.register_factory(Box::new(factory));
    }
    registry.register_factory(Box::new(BashToolFactory::new(Some(
        working_dir.to_path_buf(),
    ))));
    registry.register_factory(Box::new(EditToolFactory::new(working_dir)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::computer::{Desktop, Region, Scaler, ScreenSize};
    use async_trait::async_trait;
    use shopper_core::error::Result;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NullDesktop;

    #[async_trait]
    impl Desktop for NullDesktop {
        async fn screen_size(&self) -> Result<ScreenSize> {
            Ok(ScreenSize::new(1280, 800))
        }

        async fn capture(&self, _: Option<Region>, _: Option<ScreenSize>) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn pointer(&self) -> Result<(i64, i64)> {
            Ok((0, 0))
        }

        async fn send(&self, _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_without_display() {
        let dir = TempDir::new().unwrap();
        let registry = create_cli_tool_registry(dir.path(), None);
        assert_eq!(
            registry.list_tools(),
            vec!["bash", "str_replace_based_edit_tool"]
        );
    }

    #[test]
    fn test_default_tools_build_an_executor() {
        let dir = TempDir::new().unwrap();
        let computer = ComputerToolFactory::new(
            Arc::new(NullDesktop),
            Scaler::new(ScreenSize::new(1280, 800)),
        );
        let registry = create_cli_tool_registry(dir.path(), Some(computer));

        let names = shopper_core::AgentConfig::default().tools;
        let executor = registry.create_executor(&names).unwrap();
        assert_eq!(
            executor.list_tools(),
            vec!["computer", "bash", "str_replace_based_edit_tool"]
        );
        for tool in &names {
            let created = registry.create_tool(tool).unwrap();
            assert_eq!(created.name(), tool.as_str());
        }
    }
}
