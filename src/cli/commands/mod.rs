//! Subcommand implementations.

pub mod config;
pub mod files;
pub mod history;
pub mod services;

pub use files::JobKind;
