//! Shared utilities for ignition
//!
//! This crate provides:
//! - Requester identifiers
//! - Wall-clock time with a debug-only mock override
//! - Per-key locks for check-then-write sequences
//! - Default paths for config and data directories

mod ids;
mod keyed_lock;
mod paths;
mod time;

pub use ids::*;
pub use keyed_lock::*;
pub use paths::*;
pub use time::*;
