//! SQLite-backed file processing status.

use rusqlite::OptionalExtension;

use crate::db::{Database, FileJobRow};

/// File job persistence operations.
pub struct JobRepository<'a> {
    db: &'a Database,
}

impl<'a> JobRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a file. Existing rows keep their statuses; a new name wins.
    pub fn register(&self, file_id: &str, file_name: Option<&str>) -> Result<(), rusqlite::Error> {
        self.db.conn().execute(
            "INSERT INTO file_jobs (file_id, file_name, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(file_id) DO UPDATE SET
                file_name = COALESCE(excluded.file_name, file_jobs.file_name)",
            rusqlite::params![file_id, file_name],
        )?;
        Ok(())
    }

    pub fn get(&self, file_id: &str) -> Result<Option<FileJobRow>, rusqlite::Error> {
        self.db
            .conn()
            .query_row(
                "SELECT file_id, file_name, extraction_status, embedding_status, last_error, updated_at
                 FROM file_jobs WHERE file_id = ?",
                [file_id],
                Self::map_row,
            )
            .optional()
    }

    pub fn list(&self) -> Result<Vec<FileJobRow>, rusqlite::Error> {
        let mut stmt = self.db.conn().prepare(
            "SELECT file_id, file_name, extraction_status, embedding_status, last_error, updated_at
             FROM file_jobs ORDER BY updated_at DESC, file_id",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        rows.collect()
    }

    pub fn set_extraction(
        &self,
        file_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), rusqlite::Error> {
        self.register(file_id, None)?;
        self.db.conn().execute(
            "UPDATE file_jobs SET extraction_status = ?, last_error = ?, updated_at = unixepoch()
             WHERE file_id = ?",
            rusqlite::params![status, error, file_id],
        )?;
        Ok(())
    }

    pub fn set_embedding(
        &self,
        file_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), rusqlite::Error> {
        self.register(file_id, None)?;
        self.db.conn().execute(
            "UPDATE file_jobs SET embedding_status = ?, last_error = ?, updated_at = unixepoch()
             WHERE file_id = ?",
            rusqlite::params![status, error, file_id],
        )?;
        Ok(())
    }

    pub fn delete(&self, file_id: &str) -> Result<(), rusqlite::Error> {
        self.db
            .conn()
            .execute("DELETE FROM file_jobs WHERE file_id = ?", [file_id])?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileJobRow> {
        Ok(FileJobRow {
            file_id: row.get(0)?,
            file_name: row.get(1)?,
            extraction_status: row.get(2)?,
            embedding_status: row.get(3)?,
            last_error: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}
