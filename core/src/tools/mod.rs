//! Tool contract, validation and dispatch

pub mod base;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod utils;

pub use base::{Tool, ToolCall, ToolOutput};
pub use executor::{Dispatch, ToolExecutor};
pub use registry::{ToolFactory, ToolRegistry};
