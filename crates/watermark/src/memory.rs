//! In-process watermark storage.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::store::{advances, Watermark, WatermarkStore};

/// Watermarks kept in a map; lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, Watermark>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn get(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self.rows.lock().await.get(table).and_then(|w| w.last_update))
    }

    async fn set(&self, table: &str, last_update: NaiveDateTime) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        let current = rows.get(table).and_then(|w| w.last_update);
        if !advances(current, last_update) {
            return Ok(false);
        }
        rows.insert(table.to_string(), Watermark::at(table, last_update));
        Ok(true)
    }

    async fn seed(&self, table: &str) -> Result<()> {
        self.rows
            .lock()
            .await
            .entry(table.to_string())
            .or_insert_with(|| Watermark::empty(table));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Watermark>> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }
}
