//! SQLite database for settings, chat transcripts, and file jobs.

mod chat_repository;
mod job_repository;
mod migrations;
mod schema;

use rusqlite::Connection;
use std::path::PathBuf;

pub use chat_repository::ChatRepository;
pub use job_repository::JobRepository;
pub use schema::*;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at the default location.
    pub fn open() -> anyhow::Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open the database at a specific path.
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        // The settings table may hold an API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!("Failed to set database file permissions: {}", e);
            }
        }

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn, path })
    }

    /// Get the default database path.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(crate::config::XdgDirs::new().data.join("ideaprobe.db"))
    }

    /// Run database migrations.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)
    }

    /// Names of applied migrations, oldest first.
    pub fn applied_migrations(&self) -> Result<Vec<String>, rusqlite::Error> {
        migrations::applied(&self.conn)
    }

    /// Get a reference to the connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the database path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for Database struct.
    //!
    //! Coverage:
    //! - Database opening/creation
    //! - Migration logic (including idempotency)
    //! - Helper methods (conn, path)

    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open_at(db_path).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    // =========================================================================
    // Database Opening/Creation Tests
    // =========================================================================

    #[test]
    fn test_open_at_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let nested_path = tmp.path().join("deep").join("nested").join("test.db");
        assert!(!nested_path.parent().unwrap().exists());

        let db = Database::open_at(nested_path.clone()).unwrap();
        assert!(nested_path.exists());
        assert_eq!(db.path(), &nested_path);
    }

    #[test]
    fn test_default_path_is_under_data_dir() {
        let path = Database::default_path().unwrap();
        assert!(path.ends_with("ideaprobe/ideaprobe.db"));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_at_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("secure.db");
        let _db = Database::open_at(path.clone()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Database should have 0600 permissions");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let (_temp, db) = setup_test_db();
        let fk_status: i32 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_status, 1);
    }

    // =========================================================================
    // Migration Tests
    // =========================================================================

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, db) = setup_test_db();
        db.migrate().unwrap();
        db.migrate().unwrap();
        assert_eq!(
            db.applied_migrations().unwrap(),
            vec!["001_initial", "002_file_jobs"]
        );
    }

    #[test]
    fn test_migrate_creates_required_tables() {
        let (_temp, db) = setup_test_db();
        let tables: Vec<String> = {
            let mut stmt = db
                .conn()
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.map(|r| r.unwrap()).collect()
        };

        for table in ["settings", "conversations", "messages", "file_jobs", "migrations"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.db");
        {
            let db = Database::open_at(path.clone()).unwrap();
            db.migrate().unwrap();
            db.conn()
                .execute("INSERT INTO settings (key, value) VALUES ('k', 'v')", [])
                .unwrap();
        }

        let db = Database::open_at(path).unwrap();
        let value: String = db
            .conn()
            .query_row("SELECT value FROM settings WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, "v");
    }
}
