//! star-sync
//!
//! Mirrors the Sakila rental database from MySQL into a star schema held in
//! SurrealDB and keeps it current.
//!
//! # Commands
//!
//! - `init` - check the source, create the mirror schema, populate the date
//!   dimension and seed one watermark per tracked table
//! - `full-load` - rebuild every mirror table from the whole source
//! - `incremental` - apply changes since each table's watermark
//! - `validate` - reconcile recent rental and payment aggregates
//!
//! # Run order
//!
//! ```text
//! dimensions (film, actor, category, store, customer)
//!    │  key maps rebuilt from the mirror
//!    ├─── bridges (film_actor, film_category)
//!    └─── facts (rental, payment)
//! ```
//!
//! Every synchronizer commits its batch before its watermark moves, so a
//! failure leaves the watermark at the last committed state and the next
//! run picks the work up again.

pub mod bridge;
pub mod config;
pub mod context;
pub mod dimension;
pub mod fact;
pub mod key_map;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod testing;

pub use context::{SyncContext, SyncMode};
pub use pipeline::{full_load, incremental, init, validate, InitSummary};
pub use reconcile::{ReconcileError, ReconcileReport, ValidateOptions};
pub use report::{RunSummary, SyncReport};
