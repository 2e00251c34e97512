//! `probe config` commands.

use crate::config::{ClientConfig, Settings, KNOWN_KEYS};
use crate::db::Database;

/// Keys whose values are never printed in full.
const SECRET_KEYS: &[&str] = &["api_token"];

pub fn mask(key: &str, value: &str) -> String {
    if !SECRET_KEYS.contains(&key) {
        return value.to_string();
    }
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

pub fn list(db: &Database) -> anyhow::Result<()> {
    let settings = Settings::new(db);
    let stored = settings.list()?;

    println!("\n\x1b[1m⚙️  Settings:\x1b[0m\n");
    if stored.is_empty() {
        println!("  \x1b[2m(none stored)\x1b[0m");
    }
    for (key, value) in &stored {
        println!("  {} = {}", key, mask(key, value));
    }

    let effective = ClientConfig::load(&settings)?;
    println!("\n\x1b[1mEffective:\x1b[0m\n");
    println!("  research_url = {}", effective.research_url);
    println!("  api_base = {}", effective.api_base);
    println!(
        "  api_token = {}",
        effective
            .api_token
            .as_deref()
            .map(|t| mask("api_token", t))
            .unwrap_or_else(|| "(unset)".to_string())
    );
    println!("  connect_timeout_secs = {}", effective.connect_timeout.as_secs());
    println!(
        "  feedback_timeout_secs = {}",
        effective
            .feedback_timeout
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("\n\x1b[2mKeys: {}\x1b[0m\n", KNOWN_KEYS.join(", "));
    Ok(())
}

pub fn get(db: &Database, key: &str) -> anyhow::Result<()> {
    match Settings::new(db).get(key)? {
        Some(value) => println!("{}", mask(key, &value)),
        None => anyhow::bail!("{} is not set", key),
    }
    Ok(())
}

pub fn set(db: &Database, key: &str, value: &str) -> anyhow::Result<()> {
    Settings::new(db).set_checked(key, value)?;
    println!("✓ {} = {}", key, mask(key, value));
    Ok(())
}

pub fn unset(db: &Database, key: &str) -> anyhow::Result<()> {
    Settings::new(db).delete(key)?;
    println!("✓ {} unset", key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_only_secrets() {
        assert_eq!(mask("api_base", "http://x"), "http://x");
        assert_eq!(mask("api_token", "abcdefgh"), "abcd****");
        assert_eq!(mask("api_token", "abc"), "****");
    }
}
