#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Directory listing cache, path-resolution cache, and server capability
//! registry.
//!
//! # Overview
//!
//! These three caches are independent of one another and of any
//! particular protocol; `crates/session` consults and invalidates them as
//! a side effect of running operations, and owns the policy of *when* to
//! do so. This crate owns only the data structures and their eviction
//! rules.

mod lru;

pub mod capabilities;
pub mod directory_cache;
pub mod path_cache;

pub use capabilities::{Capability, CapabilityName, CapabilityRegistry};
pub use directory_cache::DirectoryCache;
pub use path_cache::PathCache;
