//! Database row types.

use serde::{Deserialize, Serialize};

/// A stored setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

/// Summary row for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub title: Option<String>,
    pub message_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConversationRow {
    /// Title, or a placeholder for untitled conversations.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

/// A local full-text match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub conversation_id: String,
    pub title: Option<String>,
    pub snippet: String,
}

/// Processing status of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileJobRow {
    pub file_id: String,
    pub file_name: Option<String>,
    pub extraction_status: String,
    pub embedding_status: String,
    pub last_error: Option<String>,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_falls_back() {
        let mut row = ConversationRow {
            id: "c1".to_string(),
            title: None,
            message_count: 0,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(row.display_title(), "(untitled)");
        row.title = Some("Dog-walking app".to_string());
        assert_eq!(row.display_title(), "Dog-walking app");
    }
}
