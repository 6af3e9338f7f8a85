//! Sakila MySQL source for star-sync
//!
//! Reads the operational schema through `mysql_async` and hands back rows
//! already joined with the lookup tables each dimension and fact needs.
//! Nothing in this crate ever writes to the source.

mod client;
mod queries;
mod reader;
pub mod value;

pub use client::{new_mysql_pool, sanitize_connection_string};
pub use reader::MySqlSource;
pub use value::DecodeError;

/// MySQL source connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    /// MySQL connection URI
    pub source_uri: String,
}
