//! Table definitions and schema migration for the queue database.

use rusqlite::{Connection, Result};

/// The schema version this crate writes. Bumped whenever a column is
/// added; existing databases are migrated forward in [`migrate`].
pub const SCHEMA_VERSION: i32 = 2;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS servers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host TEXT NOT NULL,
            port INTEGER,
            user TEXT,
            password TEXT,
            account TEXT,
            keyfile TEXT,
            protocol INTEGER,
            logontype INTEGER,
            timezone_offset INTEGER,
            max_connections INTEGER,
            encoding TEXT,
            bypass_proxy INTEGER,
            post_login_commands TEXT,
            name TEXT
        );
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            server INTEGER NOT NULL,
            source_file TEXT,
            target_file TEXT,
            local_path INTEGER,
            remote_path INTEGER,
            download INTEGER NOT NULL,
            size INTEGER,
            error_count INTEGER,
            resume_offset INTEGER,
            ascii_file INTEGER,
            default_exists_action INTEGER
        );
        CREATE INDEX IF NOT EXISTS server_index ON files (server);
        CREATE TABLE IF NOT EXISTS local_paths (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS remote_paths (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL
        );",
    )
}

/// Brings an existing database up to [`SCHEMA_VERSION`], adding columns
/// introduced by later versions without touching data that already
/// fits the old schema.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version > SCHEMA_VERSION {
        return Err(rusqlite::Error::ModuleError(format!(
            "queue database schema version {version} is newer than this build supports ({SCHEMA_VERSION})"
        )));
    }

    if version > 0 && version < 2 {
        conn.execute_batch("ALTER TABLE servers ADD COLUMN keyfile TEXT")?;
    }

    if version != SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
