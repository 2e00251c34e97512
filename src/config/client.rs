//! Endpoint and timeout configuration for the research and HTTP clients.

use std::time::Duration;

use super::{Settings, SettingsError};

pub const DEFAULT_RESEARCH_URL: &str = "ws://localhost:8000/ws/research";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const ENV_RESEARCH_URL: &str = "IDEAPROBE_RESEARCH_URL";
pub const ENV_API_BASE: &str = "IDEAPROBE_API_BASE";
pub const ENV_API_TOKEN: &str = "IDEAPROBE_API_TOKEN";

/// Resolved client configuration.
///
/// Precedence: environment, then stored settings, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub research_url: String,
    pub api_base: String,
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    /// `None` waits on the feedback gate indefinitely.
    pub feedback_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            research_url: DEFAULT_RESEARCH_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            feedback_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Build from stored settings and the process environment.
    pub fn load(settings: &Settings<'_>) -> Result<Self, SettingsError> {
        Self::resolve(settings, |key| std::env::var(key).ok())
    }

    /// Build from stored settings, reading overrides through `env`.
    pub fn resolve(
        settings: &Settings<'_>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let pick = |var: &str, key: &str| -> Result<Option<String>, SettingsError> {
            match env(var).filter(|v| !v.trim().is_empty()) {
                Some(v) => Ok(Some(v)),
                None => settings.get(key),
            }
        };

        let defaults = Self::default();
        let config = Self {
            research_url: pick(ENV_RESEARCH_URL, "research_url")?.unwrap_or(defaults.research_url),
            api_base: pick(ENV_API_BASE, "api_base")?.unwrap_or(defaults.api_base),
            api_token: pick(ENV_API_TOKEN, "api_token")?,
            connect_timeout: settings
                .get_u64("connect_timeout_secs")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            feedback_timeout: settings
                .get_u64("feedback_timeout_secs")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };
        tracing::debug!(
            research_url = %config.research_url,
            api_base = %config.api_base,
            has_token = config.api_token.is_some(),
            "Resolved client config"
        );
        Ok(config)
    }
}
