//! # Shopper Core
//!
//! Core library for shopper - an unattended agent that researches purchase
//! options by driving a computer on a language model's behalf.
//!
//! The crate provides the agent loop, the tool contract and dispatch, the
//! conversation state, the Anthropic client and trajectory recording. Concrete
//! tools live with the application.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod trajectory;

pub use agent::{AgentBuilder, AgentConfig, AgentLoop, RunOutcome, RunStatus, StopSignal};
pub use config::{ModelParams, Protocol, ResolvedLlmConfig};
pub use error::{Error, Result};
pub use trajectory::TrajectoryRecorder;

/// Current version of the shopper-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
