//! Command-line surface (spec §6 treats the host as an opaque consumer;
//! this is one minimal host, not part of the engine's contract).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "xfercore", about = "Multi-protocol file-transfer engine core")]
pub struct Args {
    /// TOML configuration file (see [`xfer_core::options::StaticConfig`]).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// A file of newline-delimited commands to run against one server,
    /// then exit (see [`crate::script`]).
    #[arg(long)]
    pub script: PathBuf,

    #[arg(long)]
    pub host: String,

    #[arg(long, default_value_t = 21)]
    pub port: u16,

    #[arg(long)]
    pub user: String,

    /// Where to persist the pending-transfer queue between runs.
    #[arg(long)]
    pub queue_db: Option<PathBuf>,

    /// Increase engine verbosity; repeatable.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
