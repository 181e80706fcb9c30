//! Parses a newline-delimited script of commands into [`Command`]
//! values the scheduler can queue — a minimal stand-in for whatever
//! richer scripting/UI layer a real host would have; `spec.md` §6
//! explicitly leaves the host opaque.
//!
//! Grammar, one command per non-blank, non-`#`-comment line:
//! ```text
//! list <path>
//! get <remote-path> <remote-file> <local-path>
//! put <local-path> <remote-path> <remote-file>
//! delete <path> <file>
//! rmdir <path> <dir>
//! mkdir <path>
//! rename <from-path> <from-file> <to-path> <to-file>
//! chmod <path> <file> <mode>
//! raw <line...>
//! ```

use xfer_core::command::{Command, ExistsAction, TransferDirection, TransferSpec};
use xfer_core::server::ServerPath;

use crate::CliError;

pub fn parse_script(text: &str) -> Result<Vec<Command>, CliError> {
    let mut commands = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        commands.push(parse_line(line).map_err(|reason| CliError::Script {
            line: line_no + 1,
            reason,
        })?);
    }
    Ok(commands)
}

fn parse_line(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().ok_or("empty command")?;
    let rest: Vec<&str> = parts.collect();

    match verb {
        "list" => {
            let [path] = take(&rest)?;
            Ok(Command::List {
                path: ServerPath::parse_unix(path),
                refresh: false,
            })
        }
        "get" => {
            let [remote_path, remote_file, local_path] = take(&rest)?;
            Ok(Command::FileTransfer(TransferSpec {
                direction: TransferDirection::Download,
                local_path: local_path.into(),
                remote_path: ServerPath::parse_unix(remote_path),
                remote_file: remote_file.to_string(),
                exists_action: ExistsAction::Ask,
                resume_offset: None,
                ascii_mode: false,
            }))
        }
        "put" => {
            let [local_path, remote_path, remote_file] = take(&rest)?;
            Ok(Command::FileTransfer(TransferSpec {
                direction: TransferDirection::Upload,
                local_path: local_path.into(),
                remote_path: ServerPath::parse_unix(remote_path),
                remote_file: remote_file.to_string(),
                exists_action: ExistsAction::Ask,
                resume_offset: None,
                ascii_mode: false,
            }))
        }
        "delete" => {
            let [path, file] = take(&rest)?;
            Ok(Command::Delete {
                path: ServerPath::parse_unix(path),
                file: file.to_string(),
            })
        }
        "rmdir" => {
            let [path, dir] = take(&rest)?;
            Ok(Command::RemoveDir {
                path: ServerPath::parse_unix(path),
                dir: dir.to_string(),
            })
        }
        "mkdir" => {
            let [path] = take(&rest)?;
            Ok(Command::Mkdir(ServerPath::parse_unix(path)))
        }
        "rename" => {
            let [from_path, from_file, to_path, to_file] = take(&rest)?;
            Ok(Command::Rename {
                from_path: ServerPath::parse_unix(from_path),
                from_file: from_file.to_string(),
                to_path: ServerPath::parse_unix(to_path),
                to_file: to_file.to_string(),
            })
        }
        "chmod" => {
            let [path, file, mode] = take(&rest)?;
            Ok(Command::Chmod {
                path: ServerPath::parse_unix(path),
                file: file.to_string(),
                mode: mode.to_string(),
            })
        }
        "raw" => {
            if rest.is_empty() {
                return Err("raw requires at least one word".to_string());
            }
            Ok(Command::Raw(rest.join(" ")))
        }
        other => Err(format!("unknown command {other:?}")),
    }
}

/// Destructures `rest` into a fixed-size array, or a descriptive error
/// if the argument count doesn't match.
fn take<const N: usize>(rest: &[&str]) -> Result<[&str; N], String> {
    <[&str; N]>::try_from(rest).map_err(|_| format!("expected {N} argument(s), got {}", rest.len()))
}
