#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Shared data model for the transfer engine workspace.
//!
//! # Overview
//!
//! This crate has no I/O and no protocol knowledge of its own; it defines
//! the vocabulary every other crate in the workspace builds on: server
//! identity and paths ([`server`]), directory entries and listings
//! ([`direntry`]), the command union a session executes ([`command`]),
//! the notifications and async-request protocol a session emits
//! ([`notification`]), the reply-code result contract ([`reply`]), the
//! configuration oracle ([`options`]), the shared engine context
//! ([`context`]), a minimal single-threaded timer wheel ([`event_loop`]),
//! and a per-direction token-bucket rate limiter ([`rate_limiter`]).
//!
//! # Design
//!
//! Types here are intentionally inert: `Server`, `ServerPath`, `DirEntry`,
//! and `Command` carry no behavior beyond what their own invariants
//! require (equality, ordering, simple derivations). Behavior lives in
//! `crates/cache`, `crates/session`, `crates/engine`, and
//! `crates/scheduler`, all of which depend on this crate but not on each
//! other's internals.

pub mod command;
pub mod context;
pub mod direntry;
pub mod event_loop;
pub mod notification;
pub mod options;
pub mod rate_limiter;
pub mod reply;
pub mod server;
