//! # Dolomite - Embedded Document Store
//!
//! Dolomite is an embedded, in-process document store with a
//! MongoDB-flavoured query language, update language and cursor protocol,
//! running over a pluggable ordered key-value backend.
//!
//! ## Key Features
//!
//! - **Embedded**: No server process; commands execute in the caller's process
//! - **Rich Filters**: Comparison, logical, array, bitwise, text, geospatial
//!   and expression (`$where`) operators with canonical cross-type ordering
//! - **Update Operators**: Field, arithmetic and array update operators with
//!   upsert synthesis
//! - **Cursor Protocol**: Server-style `find`/`getMore`/`killCursors` with
//!   batching, skip/limit/sort and projections
//! - **Pluggable Storage**: Any ordered byte store behind the
//!   [`store::KeyValueStore`] trait; in-memory store and bincode codec ship
//!   as defaults
//!
//! ## Quick Start
//!
//! ```rust
//! use dolomite::command::Engine;
//! use dolomite::doc;
//!
//! # fn main() -> Result<(), dolomite::errors::DolomiteError> {
//! let engine = Engine::in_memory();
//!
//! engine.execute(&doc! {
//!     "insert": "people",
//!     "documents": [ { "_id": 1, "name": "Ada", "age": 36 } ]
//! })?;
//!
//! let result = engine.execute(&doc! {
//!     "find": "people",
//!     "filter": { "age": { "$gte": 18 } }
//! })?;
//! assert_eq!(result.get("ok"), Some(&dolomite::common::Value::Int32(1)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Values, documents, the canonical comparator, field
//!   resolution and projections
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Filter matching and operator evaluation
//! - [`update`] - Update operators and upsert synthesis
//! - [`command`] - Command execution and the cursor registry
//! - [`store`] - Storage and codec abstractions with default implementations

pub mod command;
pub mod common;
pub mod errors;
pub mod filter;
pub mod store;
pub mod update;

pub use command::Engine;
pub use common::{Document, Value};
pub use errors::{DolomiteError, DolomiteResult, ErrorKind};
