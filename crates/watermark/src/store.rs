//! Watermark storage trait and types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tables that get a watermark row at init time.
///
/// Only the dimension and fact tables are read back by the synchronizers;
/// the lookup and association tables are seeded so the state table lists
/// every table the mirror depends on.
pub const TRACKED_TABLES: [&str; 15] = [
    "film",
    "actor",
    "category",
    "store",
    "customer",
    "rental",
    "payment",
    "inventory",
    "staff",
    "language",
    "address",
    "city",
    "country",
    "film_actor",
    "film_category",
];

/// Watermark row as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Source table name
    pub table_name: String,
    /// Highest source `last_update` reflected in the mirror; `None` means a
    /// full resync is required.
    pub last_update: Option<NaiveDateTime>,
    /// When the row was last written
    pub updated_at: DateTime<Utc>,
}

impl Watermark {
    pub fn empty(table: &str) -> Self {
        Self {
            table_name: table.to_string(),
            last_update: None,
            updated_at: Utc::now(),
        }
    }

    pub fn at(table: &str, last_update: NaiveDateTime) -> Self {
        Self {
            table_name: table.to_string(),
            last_update: Some(last_update),
            updated_at: Utc::now(),
        }
    }
}

/// Whether `candidate` may replace the `current` watermark.
///
/// Watermarks never move backwards; an equal value is not an advance.
pub fn advances(current: Option<NaiveDateTime>, candidate: NaiveDateTime) -> bool {
    match current {
        Some(current) => candidate > current,
        None => true,
    }
}

/// Trait for watermark storage operations.
///
/// Implementations:
/// - `SurrealStore` - one `sync_state:<table>` record per table
/// - `MemoryStore` - process-local map, for tests
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Stored watermark for the table; `None` when the row is missing or
    /// holds no timestamp.
    async fn get(&self, table: &str) -> Result<Option<NaiveDateTime>>;

    /// Create or update the table's row. A candidate that does not advance
    /// the stored watermark is ignored. Returns whether the row changed.
    async fn set(&self, table: &str, last_update: NaiveDateTime) -> Result<bool>;

    /// Create an empty row for the table if none exists yet.
    async fn seed(&self, table: &str) -> Result<()>;

    /// Every row, ordered by table name.
    async fn list(&self) -> Result<Vec<Watermark>>;
}
