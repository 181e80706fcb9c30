#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! A thin front-end wiring a configuration file and a scripted command
//! list into the engine/scheduler pair. This crate is host code, not
//! part of the engine's contract (spec §6 treats the host as an opaque
//! consumer) — it exists to exercise the workspace end-to-end, the way
//! `oferchen-rsync`'s `crates/cli` exercises that engine.

pub mod args;
pub mod config;
pub mod script;

use std::path::PathBuf;
use std::time::Instant;

pub use args::Args;

use xfer_core::command::{Command, CommandId};
use xfer_core::server::{Encoding, LogonType, Protocol, Server};

use scheduler::{QueueItem, TransferScheduler};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read config file {path}: {source}")]
    ReadConfig { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseConfig { path: PathBuf, source: toml::de::Error },
    #[error("failed to read script file {path}: {source}")]
    ReadScript { path: PathBuf, source: std::io::Error },
    #[error("script error on line {line}: {reason}")]
    Script { line: usize, reason: String },
    #[error(transparent)]
    Persistence(#[from] persistence::PersistenceError),
}

/// Summary of one run, returned so the binary entry point can report
/// what happened without this crate depending on any particular output
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub commands_queued: usize,
    pub commands_dispatched: usize,
}

pub fn build_server(args: &Args) -> Server {
    Server {
        protocol: Protocol::Ftp,
        host: args.host.clone(),
        port: args.port,
        user: args.user.clone(),
        logon_type: LogonType::Ask,
        encoding: Encoding::Auto,
        timezone_offset_minutes: None,
        max_connections: 0,
        post_login_commands: Vec::new(),
        bypass_proxy: false,
        name: None,
    }
}

/// Loads config, parses the script, enqueues every command, persists
/// any file transfers if `--queue-db` was given, and runs one dispatch
/// round. Driving the dispatched commands over the wire is left to the
/// engine/session layer, which this crate wires to but does not embed.
pub fn run(args: &Args) -> Result<RunSummary, CliError> {
    let config = config::load_config(args.config.as_deref(), args.verbose)?;
    let server = build_server(args);

    let text = std::fs::read_to_string(&args.script).map_err(|source| CliError::ReadScript {
        path: args.script.clone(),
        source,
    })?;
    let commands = script::parse_script(&text)?;

    let mut scheduler = TransferScheduler::new(&config);
    for (index, command) in commands.iter().enumerate() {
        scheduler.enqueue(QueueItem {
            id: CommandId(index as u64),
            server: server.clone(),
            command: command.clone(),
            retry_count: 0,
            priority: 0,
        });
    }

    if let Some(queue_db) = &args.queue_db {
        let storage = persistence::QueueStorage::open(queue_db)?;
        for (index, command) in commands.iter().enumerate() {
            if let Command::FileTransfer(spec) = command {
                storage.save_transfer(CommandId(index as u64), &server, &Default::default(), spec, 0)?;
            }
        }
    }

    let dispatched = scheduler.dispatch(&config, Instant::now());

    Ok(RunSummary {
        commands_queued: commands.len(),
        commands_dispatched: dispatched.len(),
    })
}
