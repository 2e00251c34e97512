//! Configuration management.

mod client;
mod settings;
mod xdg;

pub use client::{
    ClientConfig, DEFAULT_API_BASE, DEFAULT_RESEARCH_URL, ENV_API_BASE, ENV_API_TOKEN,
    ENV_RESEARCH_URL,
};
pub use settings::{Settings, SettingsError, KNOWN_KEYS};
pub use xdg::XdgDirs;
