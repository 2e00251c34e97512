//! XDG Base Directory support.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "ideaprobe";

/// XDG directory paths for ideaprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdgDirs {
    /// Config directory (~/.config/ideaprobe or XDG_CONFIG_HOME/ideaprobe)
    pub config: PathBuf,
    /// Data directory (~/.local/share/ideaprobe or XDG_DATA_HOME/ideaprobe)
    pub data: PathBuf,
    /// Cache directory (~/.cache/ideaprobe or XDG_CACHE_HOME/ideaprobe)
    pub cache: PathBuf,
    /// State directory (~/.local/state/ideaprobe or XDG_STATE_HOME/ideaprobe)
    pub state: PathBuf,
}

impl XdgDirs {
    /// Get XDG directories, respecting environment variables.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::resolve(&home, |key| std::env::var(key).ok())
    }

    /// Resolve against `home`, reading `XDG_*` variables through `lookup`.
    ///
    /// Empty or relative values are ignored, per the XDG base directory rules.
    pub fn resolve(home: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = |var: &str, fallback: &str| {
            lookup(var)
                .map(PathBuf::from)
                .filter(|p| p.is_absolute())
                .unwrap_or_else(|| home.join(fallback))
                .join(APP_DIR)
        };

        Self {
            config: base("XDG_CONFIG_HOME", ".config"),
            data: base("XDG_DATA_HOME", ".local/share"),
            cache: base("XDG_CACHE_HOME", ".cache"),
            state: base("XDG_STATE_HOME", ".local/state"),
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.data, &self.cache, &self.state] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Where cached transcripts live.
    pub fn transcripts(&self) -> PathBuf {
        self.cache.join("transcripts")
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_under_home() {
        let dirs = XdgDirs::resolve(Path::new("/home/ada"), lookup(&[]));
        assert_eq!(dirs.config, PathBuf::from("/home/ada/.config/ideaprobe"));
        assert_eq!(dirs.data, PathBuf::from("/home/ada/.local/share/ideaprobe"));
        assert_eq!(dirs.cache, PathBuf::from("/home/ada/.cache/ideaprobe"));
        assert_eq!(dirs.state, PathBuf::from("/home/ada/.local/state/ideaprobe"));
    }

    #[test]
    fn test_env_overrides() {
        let dirs = XdgDirs::resolve(
            Path::new("/home/ada"),
            lookup(&[("XDG_DATA_HOME", "/srv/data"), ("XDG_CACHE_HOME", "/tmp/cache")]),
        );
        assert_eq!(dirs.data, PathBuf::from("/srv/data/ideaprobe"));
        assert_eq!(dirs.cache, PathBuf::from("/tmp/cache/ideaprobe"));
        assert_eq!(dirs.config, PathBuf::from("/home/ada/.config/ideaprobe"));
    }

    #[test]
    fn test_relative_and_empty_overrides_ignored() {
        let dirs = XdgDirs::resolve(
            Path::new("/home/ada"),
            lookup(&[("XDG_CONFIG_HOME", "relative/cfg"), ("XDG_STATE_HOME", "")]),
        );
        assert_eq!(dirs.config, PathBuf::from("/home/ada/.config/ideaprobe"));
        assert_eq!(dirs.state, PathBuf::from("/home/ada/.local/state/ideaprobe"));
    }

    #[test]
    fn test_ensure_dirs_creates_all() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_string_lossy().to_string();
        let dirs = XdgDirs::resolve(
            tmp.path(),
            lookup(&[("XDG_DATA_HOME", root.as_str())]),
        );
        dirs.ensure_dirs().unwrap();
        for dir in [&dirs.config, &dirs.data, &dirs.cache, &dirs.state] {
            assert!(dir.is_dir(), "{:?} should exist", dir);
        }
        assert_eq!(dirs.transcripts(), dirs.cache.join("transcripts"));
    }
}
