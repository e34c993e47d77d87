//! Transactional key-value engine for GeoDB.
//!
//! The object store is written against the [`KvEngine`] / [`KvTxn`] traits.
//! Any engine that offers snapshot-isolated transactions, ordered prefix
//! scans, per-entry expiry, and conflict detection on commit can back it.
//!
//! # Storage Backends
//!
//! - [`MemoryEngine`] -- multi-version in-memory engine. With a data
//!   directory it appends every commit to a [`CommitLog`] before the commit
//!   becomes visible, and replays that log on open.
//!
//! # Rules
//!
//! 1. A transaction reads the snapshot that was committed when it began,
//!    overlaid with its own pending writes.
//! 2. Commit fails with [`KvError::Conflict`] if another transaction
//!    committed a write to any of the same keys after the snapshot.
//! 3. Entries past their `expires_at` are invisible to every read.
//! 4. Dropping an uncommitted transaction discards it.

pub mod config;
pub mod entry;
pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use config::{EngineConfig, SyncMode};
pub use entry::Entry;
pub use error::{KvError, KvResult};
pub use log::{CommitLog, LogOp, LogRecord};
pub use memory::{MemoryEngine, MemoryTxn};
pub use traits::{KvEngine, KvTxn};
