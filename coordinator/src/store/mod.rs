//! Persistence layer over the coordinator's SQLite pool.
//!
//! Correctness under concurrency comes from database constraints, not
//! in-process locks: the creation and session paths insert, detect the
//! unique violation, and re-select the winner.

pub mod agents;
pub mod events;
pub mod sessions;
pub mod tasks;
pub mod workspaces;
