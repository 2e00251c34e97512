//! SQLite-backed chat transcripts.
//!
//! This repository encapsulates all SQL operations for:
//! - Conversations and their titles (`conversations`)
//! - Ordered transcript messages (`messages`)
//! - Local search across titles and message content

use rusqlite::OptionalExtension;

use crate::chat::{Message, StoreError, TranscriptBackend};
use crate::db::{ConversationRow, Database, SearchHit};

const SNIPPET_CHARS: usize = 80;

/// Conversation persistence operations.
pub struct ChatRepository<'a> {
    db: &'a Database,
}

impl<'a> ChatRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the conversation row if it doesn't exist.
    pub fn ensure_conversation(&self, id: &str) -> Result<(), rusqlite::Error> {
        self.db.conn().execute(
            "INSERT OR IGNORE INTO conversations (id, created_at, updated_at)
             VALUES (?, unixepoch(), unixepoch())",
            [id],
        )?;
        Ok(())
    }

    pub fn set_title(&self, id: &str, title: &str) -> Result<(), rusqlite::Error> {
        self.ensure_conversation(id)?;
        self.db.conn().execute(
            "UPDATE conversations SET title = ?, updated_at = unixepoch() WHERE id = ?",
            [title, id],
        )?;
        Ok(())
    }

    pub fn title(&self, id: &str) -> Result<Option<String>, rusqlite::Error> {
        let title: Option<Option<String>> = self
            .db
            .conn()
            .query_row("SELECT title FROM conversations WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(title.flatten())
    }

    /// Conversations, most recently updated first.
    pub fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationRow>, rusqlite::Error> {
        let mut stmt = self.db.conn().prepare(
            "SELECT c.id, c.title, COUNT(m.id), c.created_at, c.updated_at
             FROM conversations c
             LEFT JOIN messages m ON m.conversation_id = c.id
             GROUP BY c.id
             ORDER BY c.updated_at DESC, c.rowid DESC
             LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(ConversationRow {
                id: row.get(0)?,
                title: row.get(1)?,
                message_count: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    /// Id of the most recently updated conversation.
    pub fn latest_conversation(&self) -> Result<Option<String>, rusqlite::Error> {
        self.db
            .conn()
            .query_row(
                "SELECT id FROM conversations ORDER BY updated_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
    }

    /// Case-insensitive substring search over titles and message content.
    ///
    /// One hit per conversation, newest conversations first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, rusqlite::Error> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(query));

        let mut stmt = self.db.conn().prepare(
            "SELECT c.id, c.title,
                    (SELECT m.content FROM messages m
                     WHERE m.conversation_id = c.id AND m.content LIKE ?1 ESCAPE '\\'
                     ORDER BY m.position LIMIT 1)
             FROM conversations c
             WHERE c.title LIKE ?1 ESCAPE '\\'
                OR EXISTS (SELECT 1 FROM messages m
                           WHERE m.conversation_id = c.id AND m.content LIKE ?1 ESCAPE '\\')
             ORDER BY c.updated_at DESC, c.rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![pattern, limit as i64], |row| {
            let title: Option<String> = row.get(1)?;
            let content: Option<String> = row.get(2)?;
            let snippet = match content {
                Some(content) => snippet(&content, query),
                None => title.clone().unwrap_or_default(),
            };
            Ok(SearchHit {
                conversation_id: row.get(0)?,
                title,
                snippet,
            })
        })?;
        rows.collect()
    }

    fn upsert_message(
        &self,
        conversation_id: &str,
        position: usize,
        message: &Message,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(message)?;
        let conn = self.db.conn();
        conn.execute_batch("BEGIN")?;

        let result = (|| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations (id, created_at, updated_at)
                 VALUES (?, unixepoch(), unixepoch())",
                [conversation_id],
            )?;
            conn.execute(
                "INSERT INTO messages (id, conversation_id, position, role, content, payload, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    position = excluded.position,
                    content = excluded.content,
                    payload = excluded.payload",
                rusqlite::params![
                    message.id,
                    conversation_id,
                    position as i64,
                    message.role.as_str(),
                    message.content,
                    payload,
                    message.timestamp.timestamp(),
                ],
            )?;
            conn.execute(
                "UPDATE conversations SET updated_at = unixepoch() WHERE id = ?",
                [conversation_id],
            )?;
            Ok::<_, rusqlite::Error>(())
        })();

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e.into())
            }
        }
    }
}

impl TranscriptBackend for ChatRepository<'_> {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn save(&self, conversation_id: &str, position: usize, message: &Message) -> Result<(), StoreError> {
        self.upsert_message(conversation_id, position, message)
    }

    fn load(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT payload FROM messages WHERE conversation_id = ? ORDER BY position",
        )?;
        let payloads = stmt
            .query_map([conversation_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    fn clear(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.db
            .conn()
            .execute("DELETE FROM conversations WHERE id = ?", [conversation_id])?;
        Ok(())
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Window of `content` around the first case-insensitive match of `query`.
fn snippet(content: &str, query: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let lower: Vec<char> = content.chars().flat_map(char::to_lowercase).collect();
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();

    // Lowercasing can change length for some scripts; only trust the index
    // when it didn't.
    let hit = if lower.len() == chars.len() {
        lower
            .windows(needle.len().max(1))
            .position(|w| w == needle.as_slice())
            .unwrap_or(0)
    } else {
        0
    };

    let start = hit.saturating_sub(SNIPPET_CHARS / 4);
    let end = (start + SNIPPET_CHARS).min(chars.len());
    let mut out: String = chars[start..end].iter().collect();
    if start > 0 {
        out.insert_str(0, "...");
    }
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessageMarker, MessagePatch, TranscriptStore};
    use tempfile::TempDir;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_at(temp_dir.path().join("test.db")).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    // =========================================================================
    // Backend Tests
    // =========================================================================

    #[test]
    fn test_save_and_load_in_order() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);

        repo.save("c1", 0, &Message::user("first")).unwrap();
        repo.save("c1", 1, &Message::assistant("second")).unwrap();

        let loaded = repo.load("c1").unwrap();
        let contents: Vec<&str> = loaded.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_save_same_id_updates_in_place() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);

        let mut msg = Message::assistant_placeholder();
        repo.save("c1", 0, &msg).unwrap();
        msg.content = "final".to_string();
        msg.marker = Some(MessageMarker::Complete);
        repo.save("c1", 0, &msg).unwrap();

        let loaded = repo.load("c1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], msg);
    }

    #[test]
    fn test_load_unknown_is_empty() {
        let (_tmp, db) = setup_test_db();
        assert!(ChatRepository::new(&db).load("nope").unwrap().is_empty());
    }

    #[test]
    fn test_clear_cascades_to_messages() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);
        repo.save("c1", 0, &Message::user("bye")).unwrap();
        repo.clear("c1").unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(repo.list_conversations(10).unwrap().is_empty());
    }

    #[test]
    fn test_works_as_store_backend() {
        let (_tmp, db) = setup_test_db();
        {
            let mut store = TranscriptStore::new("c1").with_backend(ChatRepository::new(&db));
            store.append(Message::user("Is a board-game cafe viable?"));
            let id = store.append(Message::assistant_placeholder());
            store
                .update(
                    &id,
                    MessagePatch::default()
                        .content("Likely, near campuses.")
                        .marker(MessageMarker::Complete),
                )
                .unwrap();
        }

        let mut store = TranscriptStore::new("c1").with_backend(ChatRepository::new(&db));
        assert_eq!(store.restore().unwrap(), 2);
        assert_eq!(store.messages()[1].content, "Likely, near campuses.");
    }

    // =========================================================================
    // Conversation Metadata Tests
    // =========================================================================

    #[test]
    fn test_titles() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);

        assert_eq!(repo.title("c1").unwrap(), None);
        repo.set_title("c1", "Board-game cafe").unwrap();
        assert_eq!(repo.title("c1").unwrap().as_deref(), Some("Board-game cafe"));
    }

    #[test]
    fn test_list_conversations_counts_messages() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);
        repo.save("a", 0, &Message::user("one")).unwrap();
        repo.save("b", 0, &Message::user("one")).unwrap();
        repo.save("b", 1, &Message::assistant("two")).unwrap();

        let rows = repo.list_conversations(10).unwrap();
        assert_eq!(rows.len(), 2);
        // Same-second updates fall back to insertion order, newest first.
        assert_eq!(rows[0].id, "b");
        assert_eq!(rows[0].message_count, 2);
        assert_eq!(repo.latest_conversation().unwrap().as_deref(), Some("b"));
    }

    // =========================================================================
    // Search Tests
    // =========================================================================

    #[test]
    fn test_search_matches_content_case_insensitively() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);
        repo.save("c1", 0, &Message::user("Would a Mobile Sauna rental work?"))
            .unwrap();
        repo.save("c2", 0, &Message::user("Pet food subscription")).unwrap();

        let hits = repo.search("mobile sauna", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].conversation_id, "c1");
        assert!(hits[0].snippet.contains("Mobile Sauna"));
    }

    #[test]
    fn test_search_matches_title() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);
        repo.save("c1", 0, &Message::user("unrelated")).unwrap();
        repo.set_title("c1", "Sauna business").unwrap();

        let hits = repo.search("sauna", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].snippet, "Sauna business");
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let (_tmp, db) = setup_test_db();
        let repo = ChatRepository::new(&db);
        repo.save("c1", 0, &Message::user("margin of 50 percent")).unwrap();

        assert!(repo.search("50%", 10).unwrap().is_empty());
        assert!(repo.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_snippet_windows_long_content() {
        let content = format!("{}needle{}", "a".repeat(100), "b".repeat(100));
        let s = snippet(&content, "NEEDLE");
        assert!(s.starts_with("..."));
        assert!(s.ends_with("..."));
        assert!(s.contains("needle"));
    }
}
