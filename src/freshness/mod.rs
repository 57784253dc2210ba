//! Freshness detection: which documents need rendering again.
//!
//! - [`ModificationTracker`] remembers the source mtime of every successful
//!   render, so repeated live passes only re-render touched documents
//! - [`get_mtime`] reads modification times from disk

mod mtime;
mod tracker;

pub use mtime::get_mtime;
pub use tracker::ModificationTracker;
