//! Local JSON cache of transcripts for offline resume.
//!
//! ## Storage Format
//!
//! One file per conversation in the cache directory:
//! - `{conversation_id}.json` - metadata plus the ordered message list

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::store::{StoreError, TranscriptBackend};

/// Cached transcript as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTranscript {
    pub conversation_id: String,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Summary of a cached transcript.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub conversation_id: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Clone)]
pub struct TranscriptCache {
    dir: PathBuf,
}

impl TranscriptCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Conversation ids are used as file names.
    fn validate_id(id: &str) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidId("id cannot be empty".to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StoreError::InvalidId(format!(
                "'{}' may only contain letters, numbers, dashes, and underscores",
                id
            )));
        }
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read(&self, id: &str) -> Result<Option<CachedTranscript>, StoreError> {
        Self::validate_id(id)?;
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&self, transcript: &CachedTranscript) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&transcript.conversation_id);
        // Write to a sibling file first so a crash never leaves half a transcript.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(transcript)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Cached conversations, most recently updated first.
    pub fn list(&self) -> Result<Vec<CacheEntry>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read(id) {
                Ok(Some(t)) => entries.push(CacheEntry {
                    conversation_id: t.conversation_id,
                    updated_at: t.updated_at,
                    message_count: t.messages.len(),
                }),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable cache file"),
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }
}

impl TranscriptBackend for TranscriptCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn save(&self, conversation_id: &str, position: usize, message: &Message) -> Result<(), StoreError> {
        let mut transcript = self.read(conversation_id)?.unwrap_or_else(|| CachedTranscript {
            conversation_id: conversation_id.to_string(),
            updated_at: Utc::now(),
            messages: Vec::new(),
        });

        let len = transcript.messages.len();
        if position < len {
            transcript.messages[position] = message.clone();
        } else if position == len {
            transcript.messages.push(message.clone());
        } else {
            return Err(StoreError::PositionGap { position, len });
        }
        transcript.updated_at = Utc::now();
        self.write(&transcript)
    }

    fn load(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .read(conversation_id)?
            .map(|t| t.messages)
            .unwrap_or_default())
    }

    fn clear(&self, conversation_id: &str) -> Result<(), StoreError> {
        Self::validate_id(conversation_id)?;
        let path = self.path_for(conversation_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TranscriptCache) {
        let tmp = TempDir::new().unwrap();
        let cache = TranscriptCache::new(tmp.path().join("transcripts"));
        (tmp, cache)
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (_tmp, cache) = setup();
        assert!(cache.load("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_dir_and_round_trips() {
        let (_tmp, cache) = setup();
        let msg = Message::user("Will a mobile sauna rental work?");
        cache.save("conv-1", 0, &msg).unwrap();

        assert!(cache.dir().join("conv-1.json").exists());
        let loaded = cache.load("conv-1").unwrap();
        assert_eq!(loaded, vec![msg]);
    }

    #[test]
    fn test_save_at_existing_position_replaces() {
        let (_tmp, cache) = setup();
        let mut msg = Message::assistant_placeholder();
        cache.save("conv-1", 0, &msg).unwrap();
        msg.content = "filled".to_string();
        cache.save("conv-1", 0, &msg).unwrap();

        let loaded = cache.load("conv-1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "filled");
    }

    #[test]
    fn test_save_past_end_reports_gap() {
        let (_tmp, cache) = setup();
        cache.save("conv-1", 0, &Message::user("first")).unwrap();

        let err = cache.save("conv-1", 3, &Message::user("fourth")).unwrap_err();
        assert!(matches!(err, StoreError::PositionGap { position: 3, len: 1 }));
        assert_eq!(cache.load("conv-1").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let (_tmp, cache) = setup();
        let msg = Message::user("x");
        assert!(matches!(
            cache.save("../escape", 0, &msg),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(cache.load(""), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn test_clear_removes_file() {
        let (_tmp, cache) = setup();
        cache.save("conv-1", 0, &Message::user("x")).unwrap();
        cache.clear("conv-1").unwrap();
        assert!(cache.load("conv-1").unwrap().is_empty());
        // Clearing again is fine.
        cache.clear("conv-1").unwrap();
    }

    #[test]
    fn test_list_sorted_newest_first() {
        let (_tmp, cache) = setup();
        cache.save("older", 0, &Message::user("a")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        cache.save("newer", 0, &Message::user("b")).unwrap();
        cache.save("newer", 1, &Message::assistant("c")).unwrap();

        let entries = cache.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].conversation_id, "newer");
        assert_eq!(entries[0].message_count, 2);
    }
}
