//! Conversation history commands.

use chrono::{DateTime, Utc};

use crate::chat::{MessageMarker, Role, TranscriptBackend, TranscriptCache, TranscriptStore};
use crate::config::XdgDirs;
use crate::db::{ChatRepository, Database};

/// Human-friendly "time ago".
pub fn format_relative_time(dt: DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(dt);

    if diff.num_seconds() < 60 {
        "just now".to_string()
    } else if diff.num_minutes() < 60 {
        let mins = diff.num_minutes();
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if diff.num_hours() < 24 {
        let hours = diff.num_hours();
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if diff.num_days() < 7 {
        let days = diff.num_days();
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// List recent conversations.
pub fn list(db: &Database, limit: usize) -> anyhow::Result<()> {
    let rows = ChatRepository::new(db).list_conversations(limit)?;
    if rows.is_empty() {
        println!("\n  No conversations yet.");
        println!("  Start one with: probe ask \"<your idea>\"\n");
        return Ok(());
    }

    println!("\n\x1b[1m📚 Conversations:\x1b[0m\n");
    for row in &rows {
        println!("  \x1b[1m{}\x1b[0m", row.display_title());
        println!(
            "    {} | {} msgs | {}",
            row.id,
            row.message_count,
            format_relative_time(from_unix(row.updated_at))
        );
    }
    println!();
    Ok(())
}

/// Print a transcript. Without an id, the most recent conversation.
pub fn show(db: &Database, id: Option<&str>) -> anyhow::Result<()> {
    let repo = ChatRepository::new(db);
    let id = match id {
        Some(id) => id.to_string(),
        None => match repo.latest_conversation()? {
            Some(id) => id,
            None => {
                println!("  No conversations yet.");
                return Ok(());
            }
        },
    };

    let mut store = TranscriptStore::new(id.clone())
        .with_backend(ChatRepository::new(db))
        .with_backend(TranscriptCache::new(XdgDirs::new().transcripts()));
    if store.restore()? == 0 {
        anyhow::bail!("Conversation not found: {}", id);
    }

    if let Some(title) = repo.title(&id)? {
        println!("\n\x1b[1m{}\x1b[0m", title);
    }
    println!("\x1b[2m{}\x1b[0m\n", id);

    for message in store.messages() {
        let label = match message.role {
            Role::User => "\x1b[1;36myou\x1b[0m",
            Role::Assistant => "\x1b[1;33mprobe\x1b[0m",
        };
        let marker = match message.marker {
            Some(MessageMarker::Interrupted) => " \x1b[2m(interrupted)\x1b[0m",
            Some(MessageMarker::Failed) => " \x1b[2m(failed)\x1b[0m",
            Some(MessageMarker::AwaitingFeedback) => " \x1b[2m(awaiting feedback)\x1b[0m",
            Some(MessageMarker::Complete) => "",
            None => " \x1b[2m(incomplete)\x1b[0m",
        };
        println!(
            "{} \x1b[2m{}\x1b[0m{}",
            label,
            format_relative_time(message.timestamp),
            marker
        );
        println!("{}", message.content);
        for (i, c) in message.citations.iter().enumerate() {
            println!("  \x1b[2m[{}] {} <{}>\x1b[0m", i + 1, c.name, c.url);
        }
        println!();
    }
    Ok(())
}

/// Remove a conversation from the database and the local cache.
pub fn clear(db: &Database, id: &str) -> anyhow::Result<()> {
    ChatRepository::new(db).clear(id)?;
    TranscriptCache::new(XdgDirs::new().transcripts()).clear(id)?;
    println!("🗑️  Cleared conversation {}", id);
    Ok(())
}
