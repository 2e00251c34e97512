//! `probe files` commands: extraction and embedding status.

use crate::config::{ClientConfig, Settings};
use crate::db::{Database, FileJobRow, JobRepository};
use crate::jobs::{EmbeddingTracker, ExtractionTracker, JobError, JobStatus, JobTracker};
use crate::services::{EnhancementClient, ServiceError};

/// Which backend job a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum JobKind {
    Extraction,
    Embedding,
}

fn print_row(row: &FileJobRow) {
    let name = row.file_name.as_deref().unwrap_or("");
    println!("  \x1b[1m{}\x1b[0m {}", row.file_id, name);
    println!(
        "    extraction: {} | embedding: {}",
        row.extraction_status, row.embedding_status
    );
    if let Some(err) = &row.last_error {
        println!("    \x1b[31mlast error: {}\x1b[0m", err);
    }
}

pub fn status(db: &Database, file_id: Option<&str>) -> anyhow::Result<()> {
    let repo = JobRepository::new(db);
    let rows = match file_id {
        Some(id) => match repo.get(id)? {
            Some(row) => vec![row],
            None => anyhow::bail!("Unknown file: {}", id),
        },
        None => repo.list()?,
    };

    if rows.is_empty() {
        println!("  No files tracked yet.");
        return Ok(());
    }
    println!();
    for row in &rows {
        print_row(row);
    }
    println!();
    Ok(())
}

/// Apply the server's answer to a trigger. Returns the stored status.
fn settle<S: JobStatus>(
    tracker: &mut JobTracker<S>,
    reply: Result<String, ServiceError>,
) -> Result<S, JobError> {
    match reply {
        Ok(raw) => tracker.report(&raw),
        Err(e) => tracker.fail(e.to_string()),
    }
}

/// Start (or retry) a job and record what the server says.
pub async fn trigger(
    db: &Database,
    kind: JobKind,
    file_id: &str,
    file_name: Option<&str>,
    retry: bool,
) -> anyhow::Result<()> {
    let repo = JobRepository::new(db);
    repo.register(file_id, file_name)?;
    let row = repo
        .get(file_id)?
        .ok_or_else(|| anyhow::anyhow!("Unknown file: {}", file_id))?;

    let config = ClientConfig::load(&Settings::new(db))?;
    let client = EnhancementClient::from_config(&config);

    match kind {
        JobKind::Extraction => {
            let mut tracker = ExtractionTracker::parse(&row.extraction_status)?;
            if retry {
                tracker.retry()?;
            } else {
                tracker.trigger()?;
            }
            repo.set_extraction(file_id, tracker.status().as_str(), None)?;
            let reply = client.extract_content(file_id).await;
            let status = settle(&mut tracker, reply)?;
            repo.set_extraction(file_id, status.as_str(), tracker.last_error())?;
        }
        JobKind::Embedding => {
            let mut tracker = EmbeddingTracker::parse(&row.embedding_status)?;
            if retry {
                tracker.retry()?;
            } else {
                tracker.trigger()?;
            }
            repo.set_embedding(file_id, tracker.status().as_str(), None)?;
            let reply = client.process_embeddings(file_id).await;
            let status = settle(&mut tracker, reply)?;
            repo.set_embedding(file_id, status.as_str(), tracker.last_error())?;
        }
    }

    if let Some(row) = repo.get(file_id)? {
        print_row(&row);
    }
    Ok(())
}

/// Record a status string reported out of band (e.g. from a webhook log).
pub fn report(db: &Database, kind: JobKind, file_id: &str, status: &str) -> anyhow::Result<()> {
    let repo = JobRepository::new(db);
    repo.register(file_id, None)?;
    let row = repo
        .get(file_id)?
        .ok_or_else(|| anyhow::anyhow!("Unknown file: {}", file_id))?;

    match kind {
        JobKind::Extraction => {
            let mut tracker = ExtractionTracker::parse(&row.extraction_status)?;
            let next = tracker.report(status)?;
            repo.set_extraction(file_id, next.as_str(), None)?;
        }
        JobKind::Embedding => {
            let mut tracker = EmbeddingTracker::parse(&row.embedding_status)?;
            let next = tracker.report(status)?;
            repo.set_embedding(file_id, next.as_str(), None)?;
        }
    }
    if let Some(row) = repo.get(file_id)? {
        print_row(&row);
    }
    Ok(())
}
