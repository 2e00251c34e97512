//! CLI components.

pub mod commands;
pub mod runner;

pub use runner::{run_ask, AskOptions, FixedFeedback, PromptFeedback};
