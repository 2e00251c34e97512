//! Settings management via SQLite.

use crate::db::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Setting not found: {0}")]
    NotFound(String),
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Keys `probe config set` accepts.
pub const KNOWN_KEYS: &[&str] = &[
    "research_url",
    "api_base",
    "api_token",
    "connect_timeout_secs",
    "feedback_timeout_secs",
    "show_thoughts",
];

/// Settings manager backed by SQLite.
pub struct Settings<'a> {
    db: &'a Database,
}

impl<'a> Settings<'a> {
    /// Create a new settings manager.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a setting value.
    pub fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let result: Result<String, _> = self.db.conn().query_row(
            "SELECT value FROM settings WHERE key = ?",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SettingsError::Database(e)),
        }
    }

    /// Get a setting value or return a default.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).ok().flatten().unwrap_or_else(|| default.to_string())
    }

    /// Get a boolean setting.
    pub fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        match self.get(key)? {
            Some(v) => Ok(parse_bool(&v)),
            None => Ok(false),
        }
    }

    /// Get a numeric setting. Unparseable values are an error, not a default.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, SettingsError> {
        match self.get(key)? {
            Some(v) => v
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: std::num::ParseIntError| SettingsError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Set a setting value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.db.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, value],
        )?;
        Ok(())
    }

    /// Set one of [`KNOWN_KEYS`], validating the value first.
    pub fn set_checked(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if !KNOWN_KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        let invalid = |reason: &str| SettingsError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match key {
            "research_url" if !(value.starts_with("ws://") || value.starts_with("wss://")) => {
                return Err(invalid("must start with ws:// or wss://"));
            }
            "api_base" if !(value.starts_with("http://") || value.starts_with("https://")) => {
                return Err(invalid("must start with http:// or https://"));
            }
            "connect_timeout_secs" | "feedback_timeout_secs" if value.trim().parse::<u64>().is_err() => {
                return Err(invalid("must be a whole number of seconds"));
            }
            _ => {}
        }
        self.set(key, value)
    }

    /// Delete a setting.
    pub fn delete(&self, key: &str) -> Result<(), SettingsError> {
        let deleted = self
            .db
            .conn()
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        if deleted == 0 {
            return Err(SettingsError::NotFound(key.to_string()));
        }
        Ok(())
    }

    /// List all settings.
    pub fn list(&self) -> Result<Vec<(String, String)>, SettingsError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    /// Whether thought steps are shown while streaming (default on).
    pub fn show_thoughts(&self) -> bool {
        match self.get("show_thoughts") {
            Ok(Some(v)) => parse_bool(&v),
            _ => true,
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
