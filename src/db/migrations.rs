//! Database migrations.

use rusqlite::Connection;

const MIGRATIONS: [(&str, &str); 2] = [
    ("001_initial", include_str!("sql/001_initial.sql")),
    ("002_file_jobs", include_str!("sql/002_file_jobs.sql")),
];

/// Run all pending migrations, each in its own transaction.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER DEFAULT (unixepoch())
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
            [name],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }

        tracing::info!("Running migration: {}", name);
        conn.execute_batch("BEGIN")?;
        let result = conn
            .execute_batch(sql)
            .and_then(|_| conn.execute("INSERT INTO migrations (name) VALUES (?)", [name]));
        match result {
            Ok(_) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(anyhow::anyhow!("Migration {} failed: {}", name, e));
            }
        }
    }

    Ok(())
}

/// Names of migrations recorded as applied, in order.
pub fn applied(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM migrations ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}
