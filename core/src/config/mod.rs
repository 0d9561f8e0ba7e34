//! Minimal configuration module for shopper core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{ModelParams, Protocol, ResolvedLlmConfig, COMPUTER_USE_BETA, DEFAULT_MODEL};
