//! `QueueStorage`: loads and saves the pending-transfer forest. Only
//! `Command::FileTransfer` items are persisted — matching upstream,
//! which only ever wrote file transfers to the queue database. Other
//! command kinds (list, mkdir, rename, ...) are transient and re-issued
//! by the host rather than surviving a restart.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use xfer_core::command::{CommandId, ExistsAction, TransferDirection, TransferSpec};
use xfer_core::server::{Credentials, Encoding, LogonType, Protocol, Server};

use crate::paths::{intern_local_path, intern_remote_path, lookup_local_path, lookup_remote_path};
use crate::schema::{create_tables, migrate};
use crate::PersistenceError;

pub struct QueueStorage {
    conn: Connection,
}

/// A queued file transfer plus the server it belongs to and the
/// credentials needed to reconnect, round-tripped through the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransfer {
    pub id: CommandId,
    pub server: Server,
    pub credentials: Credentials,
    pub spec: TransferSpec,
    pub error_count: u32,
}

impl QueueStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        create_tables(&conn)?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Clears every persisted server/file/path row, the same "start
    /// from an empty file" semantics as upstream's `Clear()`.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "DELETE FROM servers; DELETE FROM files; DELETE FROM local_paths; DELETE FROM remote_paths;",
        )?;
        Ok(())
    }

    fn save_server(&self, server: &Server, credentials: &Credentials) -> Result<i64, PersistenceError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM servers WHERE host = ?1 AND port = ?2 AND user = ?3",
                params![server.host, server.port, server.user],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let encoding = match &server.encoding {
            Encoding::Auto => "auto".to_string(),
            Encoding::Utf8 => "utf-8".to_string(),
            Encoding::Custom(name) => name.clone(),
        };
        let post_login_commands = server.post_login_commands.join("\n");

        self.conn.execute(
            "INSERT INTO servers (host, port, user, password, account, keyfile, protocol, logontype,
                timezone_offset, max_connections, encoding, bypass_proxy, post_login_commands, name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                server.host,
                server.port,
                server.user,
                credentials.password,
                credentials.account,
                credentials.keyfile,
                protocol_to_i64(server.protocol),
                logon_type_to_i64(server.logon_type),
                server.timezone_offset_minutes,
                server.max_connections,
                encoding,
                server.bypass_proxy as i64,
                post_login_commands,
                server.name,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_server(&self, id: i64) -> Result<(Server, Credentials), PersistenceError> {
        self.conn
            .query_row(
                "SELECT host, port, user, password, account, keyfile, protocol, logontype,
                    timezone_offset, max_connections, encoding, bypass_proxy, post_login_commands, name
                 FROM servers WHERE id = ?1",
                [id],
                |row| {
                    let post_login_commands: String = row.get(12)?;
                    let encoding: String = row.get(10)?;
                    Ok((
                        Server {
                            protocol: protocol_from_i64(row.get(6)?),
                            host: row.get(0)?,
                            port: row.get(1)?,
                            user: row.get(2)?,
                            logon_type: logon_type_from_i64(row.get(7)?),
                            encoding: encoding_from_str(&encoding),
                            timezone_offset_minutes: row.get(8)?,
                            max_connections: row.get(9)?,
                            post_login_commands: if post_login_commands.is_empty() {
                                Vec::new()
                            } else {
                                post_login_commands.split('\n').map(str::to_owned).collect()
                            },
                            bypass_proxy: row.get::<_, i64>(11)? != 0,
                            name: row.get(13)?,
                        },
                        Credentials {
                            password: row.get(3)?,
                            account: row.get(4)?,
                            keyfile: row.get(5)?,
                        },
                    ))
                },
            )
            .map_err(PersistenceError::from)
    }

    /// Persists one queued file transfer. Call [`Self::clear`] first if
    /// the intent is to replace the whole queue (matching upstream,
    /// which always rewrites the database from scratch on save).
    pub fn save_transfer(
        &self,
        id: CommandId,
        server: &Server,
        credentials: &Credentials,
        spec: &TransferSpec,
        error_count: u32,
    ) -> Result<(), PersistenceError> {
        let server_id = self.save_server(server, credentials)?;
        let local_path_id = intern_local_path(&self.conn, &spec.local_path)?;
        let remote_path_id = intern_remote_path(&self.conn, &spec.remote_path)?;

        self.conn.execute(
            "INSERT INTO files (id, server, source_file, target_file, local_path, remote_path,
                download, size, error_count, resume_offset, ascii_file, default_exists_action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, ?11)",
            params![
                id.0 as i64,
                server_id,
                spec.remote_file,
                spec.local_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                local_path_id,
                remote_path_id,
                (spec.direction == TransferDirection::Download) as i64,
                error_count,
                spec.resume_offset.map(|v| v as i64),
                spec.ascii_mode as i64,
                exists_action_to_i64(spec.exists_action),
            ],
        )?;
        Ok(())
    }

    /// Loads every persisted file transfer, reconstituting the forest
    /// the scheduler re-enqueues on startup.
    pub fn load_queue(&self) -> Result<Vec<StoredTransfer>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, server, target_file, local_path, remote_path, download,
                    error_count, resume_offset, ascii_file, default_exists_action
             FROM files",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, Option<i64>>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, server_id, remote_file, local_path_id, remote_path_id, download, error_count, resume_offset, ascii_file, exists_action) =
                row?;
            let (server, credentials) = self.load_server(server_id)?;
            let spec = TransferSpec {
                direction: if download != 0 {
                    TransferDirection::Download
                } else {
                    TransferDirection::Upload
                },
                local_path: lookup_local_path(&self.conn, local_path_id)?,
                remote_path: lookup_remote_path(&self.conn, remote_path_id)?,
                remote_file,
                exists_action: exists_action_from_i64(exists_action),
                resume_offset: resume_offset.map(|v| v as u64),
                ascii_mode: ascii_file != 0,
            };
            out.push(StoredTransfer {
                id: CommandId(id as u64),
                server,
                credentials,
                spec,
                error_count,
            });
        }
        Ok(out)
    }
}

fn protocol_to_i64(protocol: Protocol) -> i64 {
    match protocol {
        Protocol::Ftp => 0,
        Protocol::FtpImplicitTls => 1,
        Protocol::FtpExplicitTls => 2,
        Protocol::Sftp => 3,
        Protocol::ObjectStorage => 4,
    }
}

fn protocol_from_i64(value: i64) -> Protocol {
    match value {
        1 => Protocol::FtpImplicitTls,
        2 => Protocol::FtpExplicitTls,
        3 => Protocol::Sftp,
        4 => Protocol::ObjectStorage,
        _ => Protocol::Ftp,
    }
}

fn logon_type_to_i64(logon_type: LogonType) -> i64 {
    match logon_type {
        LogonType::Normal => 0,
        LogonType::Anonymous => 1,
        LogonType::Ask => 2,
        LogonType::Interactive => 3,
        LogonType::KeyFile => 4,
    }
}

fn logon_type_from_i64(value: i64) -> LogonType {
    match value {
        1 => LogonType::Anonymous,
        2 => LogonType::Ask,
        3 => LogonType::Interactive,
        4 => LogonType::KeyFile,
        _ => LogonType::Normal,
    }
}

fn encoding_from_str(value: &str) -> Encoding {
    match value {
        "auto" => Encoding::Auto,
        "utf-8" => Encoding::Utf8,
        other => Encoding::Custom(other.to_string()),
    }
}

fn exists_action_to_i64(action: ExistsAction) -> i64 {
    match action {
        ExistsAction::Ask => 0,
        ExistsAction::Overwrite => 1,
        ExistsAction::OverwriteIfNewer => 2,
        ExistsAction::OverwriteIfSizeDiffers => 3,
        ExistsAction::OverwriteIfSizeOrDateDiffers => 4,
        ExistsAction::Resume => 5,
        ExistsAction::Rename => 6,
        ExistsAction::Skip => 7,
    }
}

fn exists_action_from_i64(value: i64) -> ExistsAction {
    match value {
        1 => ExistsAction::Overwrite,
        2 => ExistsAction::OverwriteIfNewer,
        3 => ExistsAction::OverwriteIfSizeDiffers,
        4 => ExistsAction::OverwriteIfSizeOrDateDiffers,
        5 => ExistsAction::Resume,
        6 => ExistsAction::Rename,
        7 => ExistsAction::Skip,
        _ => ExistsAction::Ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::ServerPath;

    fn server() -> Server {
        Server {
            protocol: Protocol::Sftp,
            host: "example.invalid".into(),
            port: 22,
            user: "alice".into(),
            logon_type: LogonType::KeyFile,
            encoding: Encoding::Utf8,
            timezone_offset_minutes: Some(60),
            max_connections: 2,
            post_login_commands: vec!["SITE UMASK 022".into()],
            bypass_proxy: true,
            name: Some("home".into()),
        }
    }

    fn spec() -> TransferSpec {
        TransferSpec {
            direction: TransferDirection::Download,
            local_path: "/home/alice/file.txt".into(),
            remote_path: ServerPath::parse_unix("/srv/data"),
            remote_file: "file.txt".into(),
            exists_action: ExistsAction::Resume,
            resume_offset: Some(4096),
            ascii_mode: false,
        }
    }

    #[test]
    fn saved_transfer_round_trips() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let creds = Credentials {
            password: None,
            account: None,
            keyfile: Some("/home/alice/.ssh/id_ed25519".into()),
        };
        storage.save_transfer(CommandId(1), &server(), &creds, &spec(), 0).unwrap();

        let loaded = storage.load_queue().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].server, server());
        assert_eq!(loaded[0].credentials, creds);
        assert_eq!(loaded[0].spec, spec());
    }

    #[test]
    fn saving_two_transfers_to_the_same_server_reuses_the_server_row() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let creds = Credentials::default();
        storage.save_transfer(CommandId(1), &server(), &creds, &spec(), 0).unwrap();
        storage.save_transfer(CommandId(2), &server(), &creds, &spec(), 0).unwrap();
        let count: i64 = storage.conn.query_row("SELECT count(*) FROM servers", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn clear_empties_every_table() {
        let storage = QueueStorage::open_in_memory().unwrap();
        storage
            .save_transfer(CommandId(1), &server(), &Credentials::default(), &spec(), 0)
            .unwrap();
        storage.clear().unwrap();
        assert!(storage.load_queue().unwrap().is_empty());
    }
}
