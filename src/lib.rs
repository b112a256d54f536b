//! A fluent, SQL-flavoured query builder that compiles to document-database
//! aggregation pipelines and update documents.
//!
//! ```no_run
//! use sequeldoc::{MemoryStore, QueryBuilder};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), sequeldoc::QueryError> {
//! let store = Arc::new(MemoryStore::new());
//! let mut q = QueryBuilder::new().with_connection(store);
//! q.collection("users")?.where_("age", 30).or_where("name", "ann").limit(10);
//! let rows = q.find_all()?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod errors;
pub mod filter;
pub mod functions;
pub mod join;
pub mod memory;
pub mod operator;
pub mod pipeline;
pub mod results;
pub mod select;
pub mod state;
pub mod update;
pub mod utils;

pub use backend::{Backend, Collection, Cursor, DeleteReport, InsertReport, UpdateReport};
pub use builder::{QueryBuilder, Record, utc_timestamp};
pub use config::{QueryConfig, Settings};
pub use errors::{BackendError, QueryError};
pub use filter::RawFilter;
pub use functions::{ArrayContains, ArrayLength, ArrayPull, ArrayPush, Count, Increment, Max, Min, SpecialFunction};
pub use join::Join;
pub use memory::MemoryStore;
pub use operator::{BoolOp, Order};
pub use results::ResultSet;
pub use select::Field;
pub use update::Update;

/// Installs logging as described by `settings`.
///
/// Call once at startup, before building queries.
///
/// # Errors
/// Returns an error if the log directory cannot be prepared or a logger is
/// already installed.
pub fn init(settings: &Settings) -> Result<(), QueryError> {
    utils::logger::configure_from_settings(settings)
}
