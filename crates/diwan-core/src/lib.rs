//! Core types and algorithms for the diwan personnel-record pipeline.
//!
//! This crate is deliberately free of I/O and database dependencies: text
//! normalization, identifier extraction, identity matching, column mapping,
//! the domain records, and the `RecordStore` trait they are written through.
//! All other crates depend on it; it depends on nothing heavier than serde.

pub mod columns;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod row;
pub mod store;

pub use error::{Error, Result};
