//! SQLite backend for the diwan record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Relations and columns are addressed by
//! name through dynamically-assembled (identifier-vetted, value-parameterized)
//! SQL, matching the generic `RecordStore` surface.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
