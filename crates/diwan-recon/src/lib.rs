//! Reconciliation pipeline for diwan: the one engine every import pass runs
//! through, plus the field-change recorder, roster synchronization, and the
//! username provisioning pass.
//!
//! Nothing here talks to a concrete database — everything is generic over
//! `diwan_core::store::RecordStore`.

pub mod engine;
pub mod error;
pub mod history;
pub mod plan;
pub mod provision;
pub mod summary;
pub mod sync;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
