//! Fact synchronizers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use star_core::{
    DimensionKeys, FactPayment, FactRecord, FactRental, KeyAssigner, KeyMap, MirrorStore,
    NaturalKey, PaymentRow, RecordBatch, RentalRow, SourceReader, SourceRow, SurrogateKey,
};
use watermark::WatermarkStore;

use crate::context::{SyncContext, SyncMode};
use crate::report::SyncReport;

/// A fact table together with the source read that feeds it.
#[async_trait]
pub trait SourcedFact: FactRecord {
    async fn read<S: SourceReader>(
        source: &S,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Self::Source>>;
}

#[async_trait]
impl SourcedFact for FactRental {
    async fn read<S: SourceReader>(source: &S, since: Option<NaiveDateTime>) -> Result<Vec<RentalRow>> {
        source.rentals(since).await
    }
}

#[async_trait]
impl SourcedFact for FactPayment {
    async fn read<S: SourceReader>(
        source: &S,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<PaymentRow>> {
        source.payments(since).await
    }
}

/// Planned writes for one fact table.
#[derive(Debug)]
pub struct FactPlan<R> {
    pub batch: RecordBatch<R>,
    pub considered: usize,
    /// Watermark to persist after an incremental commit.
    pub watermark: Option<NaiveDateTime>,
    /// Natural key and `last_update` of the oldest skipped row.
    pub oldest_orphan: Option<(NaturalKey, NaiveDateTime)>,
}

/// New fact watermark after a run.
///
/// Advances to the newest written row, but stays strictly below the oldest
/// orphan so the orphan is read again on the next run.
pub fn fact_watermark(
    max_written: Option<NaiveDateTime>,
    oldest_orphan: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let written = max_written?;
    match oldest_orphan {
        Some(orphan) => Some(written.min(orphan - Duration::microseconds(1))),
        None => Some(written),
    }
}

/// Resolve dimension references and decide create-or-update per row.
/// Rows with any unresolved reference are left out of the batch.
pub fn plan_facts<R: FactRecord>(
    rows: &[R::Source],
    dims: &DimensionKeys,
    known: KeyMap,
    high_water: SurrogateKey,
    mode: SyncMode,
) -> FactPlan<R> {
    let mut assigner = KeyAssigner::new(known, high_water);
    let mut batch = RecordBatch::new(mode.is_full());
    let mut max_written = None;
    let mut oldest_orphan: Option<(NaturalKey, NaiveDateTime)> = None;

    for row in rows {
        match R::resolve(row, dims) {
            Some(refs) => {
                let decision = assigner.assign(row.natural_key());
                batch.push(decision, R::build(row, refs, decision.key()));
                max_written = max_written.max(Some(row.last_update()));
            }
            None => {
                debug!(table = R::TABLE, natural_key = row.natural_key(), "Skipping orphan row");
                let candidate = (row.natural_key(), row.last_update());
                oldest_orphan = match oldest_orphan {
                    Some(current) if current.1 <= candidate.1 => Some(current),
                    _ => Some(candidate),
                };
            }
        }
    }
    batch.key_high_water = assigner.high_water();

    FactPlan {
        batch,
        considered: rows.len(),
        watermark: fact_watermark(max_written, oldest_orphan.map(|(_, ts)| ts)),
        oldest_orphan,
    }
}

pub async fn sync_fact<R, S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
    dims: &DimensionKeys,
) -> Result<SyncReport>
where
    R: SourcedFact,
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    let since = match mode {
        SyncMode::Full => None,
        SyncMode::Incremental => ctx.watermarks.get(R::SOURCE_TABLE).await?,
    };

    let rows = R::read(ctx.source, since)
        .await
        .with_context(|| format!("Failed to read source table '{}'", R::SOURCE_TABLE))?;
    let known = ctx.mirror.key_map::<R>().await?;
    let high_water = ctx.mirror.key_high_water::<R>().await?;

    let plan = plan_facts::<R>(&rows, dims, known, high_water, mode);
    let report = SyncReport::new(R::TABLE, plan.considered, plan.batch.len());

    ctx.mirror.apply_records(plan.batch).await?;
    if let (SyncMode::Incremental, Some(ts)) = (mode, plan.watermark) {
        ctx.watermarks.set(R::SOURCE_TABLE, ts).await?;
    }
    if let (SyncMode::Incremental, Some((natural_key, last_update))) = (mode, plan.oldest_orphan) {
        warn!(
            table = R::TABLE,
            natural_key,
            %last_update,
            "Watermark held below unresolved row; newer rows are re-read until it resolves"
        );
    }

    info!("{report}");
    Ok(report)
}

/// Run both fact synchronizers.
pub async fn sync_facts<S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
    dims: &DimensionKeys,
) -> Result<Vec<SyncReport>>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    Ok(vec![
        sync_fact::<FactRental, _, _, _>(ctx, mode, dims).await?,
        sync_fact::<FactPayment, _, _, _>(ctx, mode, dims).await?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use star_core::{KeyPair, MirrorRecord};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2005, 7, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn map(pairs: &[(i64, i64)]) -> KeyMap {
        KeyMap::from_pairs(pairs.iter().map(|(n, s)| KeyPair {
            natural_key: *n,
            surrogate_key: *s,
        }))
    }

    fn rental(id: i64, customer_id: i64, day: u32) -> RentalRow {
        RentalRow {
            rental_id: id,
            rental_date: ts(day),
            return_date: None,
            customer_id,
            staff_id: 1,
            film_id: 1,
            store_id: 1,
            last_update: ts(day),
        }
    }

    fn dims() -> DimensionKeys {
        DimensionKeys {
            film: map(&[(1, 1)]),
            store: map(&[(1, 1)]),
            customer: map(&[(1, 1), (2, 2)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_orphans_are_counted_not_written() {
        let rows = vec![rental(1, 1, 1), rental(2, 99, 2), rental(3, 2, 3)];
        let plan = plan_facts::<FactRental>(&rows, &dims(), KeyMap::new(), 0, SyncMode::Incremental);
        let report = SyncReport::new(FactRental::TABLE, plan.considered, plan.batch.len());
        assert_eq!(report.considered, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(plan.batch.key_high_water, Some(2));
    }

    #[test]
    fn test_watermark_holds_below_oldest_orphan() {
        let rows = vec![rental(1, 1, 1), rental(2, 99, 2), rental(3, 2, 3)];
        let plan = plan_facts::<FactRental>(&rows, &dims(), KeyMap::new(), 0, SyncMode::Incremental);
        let watermark = plan.watermark.unwrap();
        assert!(watermark < ts(2));
        assert!(watermark > ts(1));
    }

    #[test]
    fn test_oldest_orphan_is_reported() {
        let rows = vec![rental(4, 98, 6), rental(1, 1, 1), rental(2, 99, 2), rental(3, 97, 9)];
        let plan = plan_facts::<FactRental>(&rows, &dims(), KeyMap::new(), 0, SyncMode::Incremental);
        assert_eq!(plan.oldest_orphan, Some((2, ts(2))));

        let clean = vec![rental(1, 1, 1)];
        let plan = plan_facts::<FactRental>(&clean, &dims(), KeyMap::new(), 0, SyncMode::Incremental);
        assert_eq!(plan.oldest_orphan, None);
    }

    #[test]
    fn test_watermark_without_orphans() {
        assert_eq!(fact_watermark(Some(ts(5)), None), Some(ts(5)));
        assert_eq!(fact_watermark(None, Some(ts(5))), None);
        assert_eq!(fact_watermark(Some(ts(1)), Some(ts(5))), Some(ts(1)));
    }

    #[test]
    fn test_existing_fact_keeps_its_key() {
        let rows = vec![rental(7, 1, 1)];
        let plan = plan_facts::<FactRental>(&rows, &dims(), map(&[(7, 40)]), 40, SyncMode::Incremental);
        assert_eq!(plan.batch.updates(), 1);
        assert_eq!(plan.batch.writes[0].record().fact_rental_key, 40);
        assert_eq!(plan.batch.key_high_water, None);
    }
}
