//! Confer Storage crate - both session-store backends.
//!
//! Provides the device-local key/value-backed store used in anonymous mode,
//! the WAL-mode SQLite store used in authenticated mode, the schema
//! migrations, and the `SessionStore` trait both backends implement.

pub mod db;
pub mod kv;
pub mod local;
pub mod migrations;
pub mod remote;

pub use db::{Database, DB_FILE};
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use local::LocalSessionStore;
pub use remote::{SessionStore, SqliteSessionStore};
