#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Control-session state machines: the operation stack and the
//! FTP/SFTP/object-storage operations.
//!
//! # Overview
//!
//! [`op`] defines the generic [`op::Operation`] trait and
//! [`op::OperationStack`] every concrete operation below is driven
//! through. [`ftp`] holds the FTP operations, fed [`ftp::FtpReply`]
//! events; [`sftp`] and [`object_storage`] hold the subprocess-driven
//! protocols, fed [`line_framed::FramedMessage`] events assembled by
//! [`line_framed::LineFramer`].
//!
//! This crate depends on `cache` because several operations invalidate
//! or populate the directory/path caches as a direct side effect of
//! completing (e.g. a successful `RNFR`/`RNTO` invalidates both the
//! source and destination directory listings); it does not depend on
//! `engine` or `scheduler`, which instead depend on it.

pub mod cache_lock;
pub mod line_framed;
pub mod op;

pub mod ftp;
pub mod object_storage;
pub mod sftp;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("operation stack is empty")]
    EmptyStack,
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}
