//! Test infrastructure: an in-memory Sakila source and a sample dataset.
//!
//! [`MemorySource`] keeps the operational tables normalized, the way MySQL
//! does, and performs the same inner joins as the MySQL reader. Tests drive
//! the engine against it plus an in-memory SurrealDB mirror.

mod memory_source;
mod sakila;

pub use memory_source::{Customer, Film, MemorySource, Payment, Rental, SakilaData, Store};
pub use sakila::{sample, sample_now, sample_time};

use anyhow::Result;
use surreal_mirror::{MirrorOpts, SurrealMirror};
use watermark::SurrealStore;

/// Fresh in-memory mirror plus a watermark store sharing its database.
/// The schema is not defined yet; run `init` first.
pub async fn memory_mirror() -> Result<(SurrealMirror, SurrealStore)> {
    let mirror = surreal_mirror::connect(&MirrorOpts::in_memory()).await?;
    let watermarks = SurrealStore::new(mirror.client().clone());
    Ok((mirror, watermarks))
}
