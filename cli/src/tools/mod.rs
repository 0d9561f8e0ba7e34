//! Tools the shopping agent drives

pub mod bash;
pub mod computer;
pub mod edit;
pub mod registry;

pub use bash::{BashTool, BashToolFactory};
pub use computer::{ComputerTool, ComputerToolFactory, MacDesktop};
pub use edit::{EditTool, EditToolFactory};
pub use registry::create_cli_tool_registry;
