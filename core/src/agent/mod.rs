//! Agent loop, conversation state and run bookkeeping

pub mod config;
pub mod context;
pub mod conversation;
pub mod core;
pub mod outcome;
pub mod usage;

pub use config::{create_client, AgentBuilder, AgentConfig};
pub use context::{ContextStrategy, FullTranscript, RecentImages};
pub use conversation::Conversation;
pub use self::core::{budget_note, AgentLoop, StopSignal};
pub use outcome::{RunOutcome, RunStatus};
pub use usage::{Pricing, UsageTracker};
