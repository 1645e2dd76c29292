//! # agentdeck-core
//!
//! Core library for agentdeck - discovery and assignment of coding-assistant
//! configuration resources.
//!
//! This library provides:
//! - Domain types for agents, commands, hooks, project markers and settings
//! - Filesystem scanning with cancellation and streaming
//! - Parsers for frontmatter markdown, settings JSON and hook scripts
//! - System (bundle) detection driven by a rule table
//! - Layered settings merge
//! - Copy/move assignment between user and project scope
//! - An append-only change log with SQLite storage
//!
//! ## Architecture
//!
//! Work is split into two phases:
//! - **Discovery:** scan → parse → classify. Failures are collected as
//!   warnings next to the resources that did parse.
//! - **Write:** assign, apply, revert. Validation happens before any side
//!   effect and failures are returned to the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentdeck_core::{CancelToken, Config, Discovery, SystemDetector};
//!
//! let config = Config::load().expect("failed to load config");
//! let discovery = Discovery::from_config(&config);
//! let roots = discovery.default_roots(&config);
//!
//! let mut report = discovery.scan(&roots, &CancelToken::new());
//! let detector = SystemDetector::from_config(&config.systems).expect("bad system rules");
//! detector.classify(&mut report.resources);
//! ```

// Re-export commonly used items at the crate root
pub use assign::{AssignOutcome, AssignWarning, AssignmentEngine, Operation};
pub use changes::{diff, ChangeLog, ChangeTracker, LineDiff, MemoryChangeLog, NewChange};
pub use config::Config;
pub use db::Database;
pub use discovery::{Discovery, DiscoveryItem, DiscoveryReport, DiscoveryWarning};
pub use error::{Error, Result};
pub use layout::Layout;
pub use merge::{ArrayStrategy, EffectiveSettings, SettingsMerger};
pub use scan::{CancelToken, ScanOptions, Scanner};
pub use systems::SystemDetector;
pub use types::*;

// Public modules
pub mod assign;
pub mod changes;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod layout;
pub mod logging;
pub mod merge;
pub mod parse;
pub mod scan;
pub mod systems;
pub mod types;
