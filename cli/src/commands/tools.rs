//! Tools listing command

use super::detect_computer;
use crate::tools::create_cli_tool_registry;
use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Show available tools
pub async fn tools_command(working_dir: &Path, display: Option<u32>) -> Result<()> {
    info!("Listing available tools");

    let computer = match detect_computer(display, None).await {
        Ok(factory) => Some(factory),
        Err(e) => {
            println!("computer: unavailable ({:#})\n", e);
            None
        }
    };
    let registry = create_cli_tool_registry(working_dir, computer);

    println!("Available tools\n");
    for name in registry.list_tools() {
        if let Some((tool_name, description)) = registry.get_tool_info(name) {
            println!("  {}", tool_name);
            let first_line = description.lines().next().unwrap_or(description);
            println!("    {}\n", first_line);
        }
    }

    Ok(())
}
