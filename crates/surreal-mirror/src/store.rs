//! [`MirrorStore`] over the SurrealDB v2 SDK.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::sql::{Id, Thing};
use surrealdb::Surreal;
use tracing::debug;

use star_core::{
    BridgeBatch, BridgeRecord, DateKey, DimDate, KeyMap, KeyPair, MirrorRecord, MirrorStore,
    RecordBatch, SurrogateKey, Write,
};

use crate::schema::{self, DATE_TABLE, KEY_SEQUENCE_TABLE};

/// Dimensional mirror stored in one SurrealDB namespace/database.
///
/// Dimension and fact rows use their surrogate key as record id
/// (`dim_film:42`); bridge rows use the key pair (`bridge_film_actor:[1, 7]`).
#[derive(Clone)]
pub struct SurrealMirror {
    client: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct StoreTotal {
    store_key: SurrogateKey,
    total: f64,
}

impl SurrealMirror {
    pub fn new(client: Surreal<Any>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.client
    }

    fn sequence_thing(table: &str) -> Thing {
        Thing::from((KEY_SEQUENCE_TABLE, Id::String(table.to_string())))
    }

    /// Count rows of any table.
    pub async fn count(&self, table: &str) -> Result<usize> {
        let mut response = self
            .client
            .query(format!("SELECT count() AS count FROM {table} GROUP ALL"))
            .await
            .with_context(|| format!("Failed to count {table}"))?;
        let count: Option<i64> = response.take((0, "count"))?;
        Ok(count.unwrap_or(0) as usize)
    }
}

/// Transaction body writing a record batch.
fn record_batch_sql<R: MirrorRecord>(batch: &RecordBatch<R>) -> String {
    let table = R::TABLE;
    let key = R::SURROGATE_FIELD;
    let mut sql = String::from("BEGIN TRANSACTION;\n");
    if batch.clear_first {
        sql.push_str(&format!("DELETE {table};\n"));
    }
    if batch.inserts() > 0 {
        sql.push_str(&format!(
            "FOR $row IN $inserts {{ CREATE type::thing('{table}', $row.{key}) CONTENT $row; }};\n"
        ));
    }
    if batch.updates() > 0 {
        sql.push_str(&format!(
            "FOR $row IN $updates {{ UPSERT type::thing('{table}', $row.{key}) CONTENT $row; }};\n"
        ));
    }
    if batch.key_high_water.is_some() {
        sql.push_str("UPSERT $sequence SET last = $high_water;\n");
    }
    sql.push_str("COMMIT TRANSACTION;");
    sql
}

/// Transaction body writing a bridge batch.
fn bridge_batch_sql<R: BridgeRecord>(batch: &BridgeBatch<R>) -> String {
    let table = R::TABLE;
    let left = R::LEFT_FIELD;
    let right = R::RIGHT_FIELD;
    let mut sql = String::from("BEGIN TRANSACTION;\n");
    if batch.clear_first {
        sql.push_str(&format!("DELETE {table};\n"));
    }
    if !batch.delete_left.is_empty() {
        sql.push_str(&format!("DELETE {table} WHERE {left} INSIDE $delete_left;\n"));
    }
    if !batch.delete_right.is_empty() {
        sql.push_str(&format!("DELETE {table} WHERE {right} INSIDE $delete_right;\n"));
    }
    if !batch.inserts.is_empty() {
        sql.push_str(&format!(
            "FOR $row IN $rows {{ UPSERT type::thing('{table}', [$row.{left}, $row.{right}]) CONTENT $row; }};\n"
        ));
    }
    sql.push_str("COMMIT TRANSACTION;");
    sql
}

#[async_trait]
impl MirrorStore for SurrealMirror {
    async fn define_schema(&self) -> Result<()> {
        let sql = schema::statements().join("\n");
        self.client
            .query(sql)
            .await
            .and_then(|r| r.check())
            .context("Failed to define mirror schema")?;
        Ok(())
    }

    async fn populate_dates(&self, dates: Vec<DimDate>) -> Result<usize> {
        let n = dates.len();
        let sql = format!(
            "BEGIN TRANSACTION;\n\
             FOR $row IN $rows {{ UPSERT type::thing('{DATE_TABLE}', $row.date_key) CONTENT $row; }};\n\
             COMMIT TRANSACTION;"
        );
        self.client
            .query(sql)
            .bind(("rows", dates))
            .await
            .and_then(|r| r.check())
            .context("Failed to populate the date dimension")?;
        Ok(n)
    }

    async fn date(&self, key: DateKey) -> Result<Option<DimDate>> {
        let mut response = self
            .client
            .query("SELECT * OMIT id FROM $record_id")
            .bind(("record_id", Thing::from((DATE_TABLE, Id::Number(key as i64)))))
            .await?;
        let rows: Vec<DimDate> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn key_map<R: MirrorRecord>(&self) -> Result<KeyMap> {
        let sql = format!(
            "SELECT {} AS natural_key, {} AS surrogate_key FROM {}",
            R::NATURAL_FIELD,
            R::SURROGATE_FIELD,
            R::TABLE
        );
        let mut response = self
            .client
            .query(sql)
            .await
            .with_context(|| format!("Failed to read key map of {}", R::TABLE))?;
        let pairs: Vec<KeyPair> = response.take(0)?;
        Ok(KeyMap::from_pairs(pairs))
    }

    async fn key_high_water<R: MirrorRecord>(&self) -> Result<SurrogateKey> {
        let mut response = self
            .client
            .query("SELECT last FROM $record_id")
            .bind(("record_id", Self::sequence_thing(R::TABLE)))
            .await?;
        let last: Option<SurrogateKey> = response.take((0, "last"))?;
        Ok(last.unwrap_or(0))
    }

    async fn apply_records<R: MirrorRecord>(&self, batch: RecordBatch<R>) -> Result<()> {
        if batch.is_noop() {
            return Ok(());
        }
        let sql = record_batch_sql(&batch);
        debug!(table = R::TABLE, inserts = batch.inserts(), updates = batch.updates(), "{sql}");

        let high_water = batch.key_high_water.unwrap_or(0);
        let (inserts, updates): (Vec<_>, Vec<_>) =
            batch.writes.into_iter().partition(Write::is_insert);
        let inserts: Vec<R> = inserts.into_iter().map(Write::into_record).collect();
        let updates: Vec<R> = updates.into_iter().map(Write::into_record).collect();

        self.client
            .query(sql)
            .bind(("inserts", inserts))
            .bind(("updates", updates))
            .bind(("sequence", Self::sequence_thing(R::TABLE)))
            .bind(("high_water", high_water))
            .await
            .and_then(|r| r.check())
            .with_context(|| format!("Failed to apply batch to {}", R::TABLE))?;
        Ok(())
    }

    async fn apply_bridge<R: BridgeRecord>(&self, batch: BridgeBatch<R>) -> Result<()> {
        let sql = bridge_batch_sql(&batch);
        debug!(
            table = R::TABLE,
            deletes_left = batch.delete_left.len(),
            deletes_right = batch.delete_right.len(),
            inserts = batch.inserts.len(),
            "{sql}"
        );
        self.client
            .query(sql)
            .bind(("delete_left", batch.delete_left))
            .bind(("delete_right", batch.delete_right))
            .bind(("rows", batch.inserts))
            .await
            .and_then(|r| r.check())
            .with_context(|| format!("Failed to apply batch to {}", R::TABLE))?;
        Ok(())
    }

    async fn records<R: MirrorRecord>(&self) -> Result<Vec<R>> {
        let sql = format!(
            "SELECT * OMIT id FROM {} ORDER BY {}",
            R::TABLE,
            R::SURROGATE_FIELD
        );
        let mut response = self.client.query(sql).await?;
        Ok(response.take(0)?)
    }

    async fn bridge_rows<R: BridgeRecord>(&self) -> Result<Vec<R>> {
        let sql = format!(
            "SELECT {left}, {right} FROM {table} ORDER BY {left}, {right}",
            left = R::LEFT_FIELD,
            right = R::RIGHT_FIELD,
            table = R::TABLE
        );
        let mut response = self.client.query(sql).await?;
        Ok(response.take(0)?)
    }

    async fn rental_count_since(&self, cutoff: DateKey) -> Result<i64> {
        let mut response = self
            .client
            .query(
                "SELECT count() AS count FROM fact_rental \
                 WHERE date_key_rented >= $cutoff GROUP ALL",
            )
            .bind(("cutoff", cutoff))
            .await?;
        let count: Option<i64> = response.take((0, "count"))?;
        Ok(count.unwrap_or(0))
    }

    async fn payment_total_since(&self, cutoff: DateKey) -> Result<f64> {
        let mut response = self
            .client
            .query(
                "SELECT math::sum(amount) AS total FROM fact_payment \
                 WHERE date_key_paid >= $cutoff GROUP ALL",
            )
            .bind(("cutoff", cutoff))
            .await?;
        let total: Option<f64> = response.take((0, "total"))?;
        Ok(total.unwrap_or(0.0))
    }

    async fn payment_totals_by_store_key_since(
        &self,
        cutoff: DateKey,
    ) -> Result<Vec<(SurrogateKey, f64)>> {
        let mut response = self
            .client
            .query(
                "SELECT store_key, math::sum(amount) AS total FROM fact_payment \
                 WHERE date_key_paid >= $cutoff GROUP BY store_key",
            )
            .bind(("cutoff", cutoff))
            .await?;
        let rows: Vec<StoreTotal> = response.take(0)?;
        Ok(rows.into_iter().map(|r| (r.store_key, r.total)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_core::{BridgeFilmActor, DimActor, KeyDecision};

    #[test]
    fn test_record_batch_sql_for_full_reload() {
        let mut batch: RecordBatch<DimActor> = RecordBatch::new(true);
        batch.key_high_water = Some(3);
        let sql = record_batch_sql(&batch);
        assert!(sql.starts_with("BEGIN TRANSACTION;\nDELETE dim_actor;\n"));
        assert!(sql.contains("UPSERT $sequence SET last = $high_water;"));
        assert!(sql.ends_with("COMMIT TRANSACTION;"));
        assert!(!sql.contains("$updates"));
    }

    #[test]
    fn test_record_batch_sql_splits_inserts_and_updates() {
        let actor = |key| DimActor {
            actor_key: key,
            actor_id: key,
            first_name: "PENELOPE".into(),
            last_name: "GUINESS".into(),
            last_update: chrono::NaiveDateTime::default(),
        };
        let mut batch = RecordBatch::new(false);
        batch.push(KeyDecision::Existing(1), actor(1));
        batch.push(KeyDecision::Fresh(2), actor(2));
        let sql = record_batch_sql(&batch);
        assert!(!sql.contains("DELETE"));
        assert!(sql.contains("CREATE type::thing('dim_actor', $row.actor_key)"));
        assert!(sql.contains("UPSERT type::thing('dim_actor', $row.actor_key)"));
        assert!(!sql.contains("$sequence"));
    }

    #[test]
    fn test_bridge_batch_sql_scoped_deletes() {
        let batch: BridgeBatch<BridgeFilmActor> =
            BridgeBatch::scoped(vec![1], Vec::new(), vec![BridgeFilmActor::pair(1, 2)]);
        let sql = bridge_batch_sql(&batch);
        assert!(sql.contains("DELETE bridge_film_actor WHERE film_key INSIDE $delete_left;"));
        assert!(!sql.contains("actor_key INSIDE"));
        assert!(sql.contains("[$row.film_key, $row.actor_key]"));
    }
}
