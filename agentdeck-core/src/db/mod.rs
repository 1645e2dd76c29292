//! Database layer for agentdeck
//!
//! SQLite storage for the change log:
//! - Schema migrations tracked by `PRAGMA user_version`
//! - Repository operations on the append-only `changes` table

pub mod repo;
pub mod schema;

pub use repo::Database;
