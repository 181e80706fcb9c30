//! Path interning: `local_paths`/`remote_paths` dedupe repeated
//! directories across many queued files, the same shape upstream uses
//! (`SaveLocalPath`/`SaveRemotePath` return a row id instead of storing
//! the full string on every `files` row).

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Result};

use xfer_core::server::ServerPath;

pub fn intern_local_path(conn: &Connection, path: &Path) -> Result<i64> {
    let text = path.to_string_lossy();
    if let Some(id) = conn
        .query_row("SELECT id FROM local_paths WHERE path = ?1", [text.as_ref()], |row| row.get(0))
        .ok()
    {
        return Ok(id);
    }
    conn.execute("INSERT INTO local_paths (path) VALUES (?1)", [text.as_ref()])?;
    Ok(conn.last_insert_rowid())
}

pub fn lookup_local_path(conn: &Connection, id: i64) -> Result<PathBuf> {
    let text: String = conn.query_row("SELECT path FROM local_paths WHERE id = ?1", [id], |row| row.get(0))?;
    Ok(PathBuf::from(text))
}

pub fn intern_remote_path(conn: &Connection, path: &ServerPath) -> Result<i64> {
    let text = path.to_string();
    if let Some(id) = conn
        .query_row("SELECT id FROM remote_paths WHERE path = ?1", [text.as_str()], |row| row.get(0))
        .ok()
    {
        return Ok(id);
    }
    conn.execute("INSERT INTO remote_paths (path) VALUES (?1)", [text.as_str()])?;
    Ok(conn.last_insert_rowid())
}

pub fn lookup_remote_path(conn: &Connection, id: i64) -> Result<ServerPath> {
    let text: String = conn.query_row("SELECT path FROM remote_paths WHERE id = ?1", [id], |row| row.get(0))?;
    Ok(ServerPath::parse_unix(&text))
}
