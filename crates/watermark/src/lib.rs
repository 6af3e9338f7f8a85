//! Watermark management for star-sync
//!
//! A watermark is the highest source-side `last_update` timestamp already
//! reflected in the mirror for one source table. Incremental synchronizers
//! read it to scope their source query and advance it after their batch has
//! been committed.
//!
//! ## Storage Backends
//!
//! - `SurrealStore` - Stores watermarks in the mirror's SurrealDB database
//! - `MemoryStore` - Keeps watermarks in process memory
//!
//! Every backend enforces the same rule: a stored watermark never moves
//! backwards.

mod memory;
pub mod store;
mod surreal;

#[cfg(test)]
mod tests;

pub use memory::MemoryStore;
pub use store::{advances, Watermark, WatermarkStore, TRACKED_TABLES};
pub use surreal::{SurrealStore, STATE_TABLE};
