//! SurrealDB v2 SDK watermark storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use surrealdb::engine::any::Any;
use surrealdb::sql::{Id, Thing};
use tracing::debug;

use crate::store::{advances, Watermark, WatermarkStore};

/// Table holding one watermark record per source table.
pub const STATE_TABLE: &str = "sync_state";

/// SurrealDB implementation of [`WatermarkStore`].
///
/// Rows live at `sync_state:<table>` in the mirror database itself, so the
/// watermarks travel with the data they describe.
#[derive(Clone)]
pub struct SurrealStore {
    client: surrealdb::Surreal<Any>,
}

impl SurrealStore {
    pub fn new(client: surrealdb::Surreal<Any>) -> Self {
        Self { client }
    }

    fn to_thing(table: &str) -> Thing {
        Thing::from((STATE_TABLE, Id::String(table.to_string())))
    }

    async fn read(&self, table: &str) -> Result<Option<Watermark>> {
        let mut response = self
            .client
            .query("SELECT * FROM $record_id")
            .bind(("record_id", Self::to_thing(table)))
            .await
            .with_context(|| format!("Failed to read watermark for '{table}'"))?;
        let rows: Vec<Watermark> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn write(&self, row: Watermark) -> Result<()> {
        let table = row.table_name.clone();
        self.client
            .query("UPSERT $record_id CONTENT $content")
            .bind(("record_id", Self::to_thing(&table)))
            .bind(("content", row))
            .await
            .and_then(|r| r.check())
            .with_context(|| format!("Failed to write watermark for '{table}'"))?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for SurrealStore {
    async fn get(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self.read(table).await?.and_then(|w| w.last_update))
    }

    async fn set(&self, table: &str, last_update: NaiveDateTime) -> Result<bool> {
        let current = self.get(table).await?;
        if !advances(current, last_update) {
            debug!(table, ?current, candidate = %last_update, "Watermark not advanced");
            return Ok(false);
        }
        self.write(Watermark::at(table, last_update)).await?;
        debug!(table, %last_update, "Watermark advanced");
        Ok(true)
    }

    async fn seed(&self, table: &str) -> Result<()> {
        if self.read(table).await?.is_none() {
            self.write(Watermark::empty(table)).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Watermark>> {
        let mut response = self
            .client
            .query(format!("SELECT * FROM {STATE_TABLE} ORDER BY table_name"))
            .await
            .context("Failed to list watermarks")?;
        Ok(response.take(0)?)
    }
}
