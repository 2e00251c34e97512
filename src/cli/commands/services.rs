//! Commands backed by the enhancement HTTP services.

use crate::config::{ClientConfig, Settings};
use crate::db::{ChatRepository, Database};
use crate::services::{ChatSearchResult, EnhancementClient};

const LOCAL_SEARCH_LIMIT: usize = 20;

fn client(db: &Database) -> anyhow::Result<EnhancementClient> {
    let config = ClientConfig::load(&Settings::new(db))?;
    Ok(EnhancementClient::from_config(&config))
}

pub async fn enhance(db: &Database, prompt: &str) -> anyhow::Result<()> {
    let enhanced = client(db)?.enhance_prompt_or_fallback(prompt).await;
    println!("{}", enhanced);
    Ok(())
}

pub async fn title(db: &Database, message: &str) -> anyhow::Result<()> {
    let title = client(db)?.generate_title_or_fallback(message).await;
    println!("{}", title);
    Ok(())
}

/// Search past chats remotely, falling back to the local database.
pub async fn search(db: &Database, query: &str, local_only: bool) -> anyhow::Result<()> {
    let mut results = if local_only {
        Vec::new()
    } else {
        client(db)?.search_chats_or_fallback(query).await
    };

    if results.is_empty() {
        results = ChatRepository::new(db)
            .search(query, LOCAL_SEARCH_LIMIT)?
            .into_iter()
            .map(|hit| ChatSearchResult {
                id: hit.conversation_id,
                title: hit.title.unwrap_or_default(),
                snippet: hit.snippet,
            })
            .collect();
    }

    if results.is_empty() {
        println!("  No matches for \"{}\".", query.trim());
        return Ok(());
    }

    println!();
    for result in &results {
        let title = if result.title.is_empty() {
            "(untitled)"
        } else {
            result.title.as_str()
        };
        println!("  \x1b[1m{}\x1b[0m \x1b[2m{}\x1b[0m", title, result.id);
        if !result.snippet.is_empty() {
            println!("    {}", result.snippet);
        }
    }
    println!();
    Ok(())
}

pub async fn podcast(db: &Database, report_id: &str) -> anyhow::Result<()> {
    let url = client(db)?.generate_podcast(report_id).await?;
    println!("🎧 {}", url);
    Ok(())
}
