//! Dimension synchronizers.
//!
//! One generic synchronizer serves every dimension. It reads the source rows
//! changed since the table's watermark (or all rows in full mode), decides
//! per natural key whether the mirror row is updated in place or inserted
//! under a fresh surrogate key, commits that batch, and only then advances
//! the watermark.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::info;

use star_core::{
    ActorRow, CategoryRow, ChangedKeys, CustomerRow, DimActor, DimCategory, DimCustomer, DimFilm,
    DimStore, DimensionRecord, FilmRow, KeyAssigner, KeyMap, MirrorStore, RecordBatch,
    SourceReader, SourceRow, StoreRow, SurrogateKey,
};
use watermark::WatermarkStore;

use crate::context::{SyncContext, SyncMode};
use crate::report::SyncReport;

/// A dimension together with the source read that feeds it.
#[async_trait]
pub trait SourcedDimension: DimensionRecord {
    async fn read<S: SourceReader>(
        source: &S,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Self::Source>>;
}

#[async_trait]
impl SourcedDimension for DimFilm {
    async fn read<S: SourceReader>(source: &S, since: Option<NaiveDateTime>) -> Result<Vec<FilmRow>> {
        source.films(since).await
    }
}

#[async_trait]
impl SourcedDimension for DimActor {
    async fn read<S: SourceReader>(source: &S, since: Option<NaiveDateTime>) -> Result<Vec<ActorRow>> {
        source.actors(since).await
    }
}

#[async_trait]
impl SourcedDimension for DimCategory {
    async fn read<S: SourceReader>(
        source: &S,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<CategoryRow>> {
        source.categories(since).await
    }
}

#[async_trait]
impl SourcedDimension for DimStore {
    async fn read<S: SourceReader>(source: &S, since: Option<NaiveDateTime>) -> Result<Vec<StoreRow>> {
        source.stores(since).await
    }
}

#[async_trait]
impl SourcedDimension for DimCustomer {
    async fn read<S: SourceReader>(
        source: &S,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<CustomerRow>> {
        source.customers(since).await
    }
}

/// Planned writes for one dimension, before anything touches the mirror.
#[derive(Debug)]
pub struct DimensionPlan<R> {
    pub batch: RecordBatch<R>,
    /// Natural keys of every processed row.
    pub changed: ChangedKeys,
    /// Largest source `last_update` among the processed rows.
    pub max_last_update: Option<NaiveDateTime>,
}

/// Decide create-or-update for every source row.
///
/// `known` is the table's key map before the run. In full mode the table is
/// cleared first, but a natural key present in `known` still gets its old
/// surrogate key back.
pub fn plan_dimension<R: DimensionRecord>(
    rows: &[R::Source],
    known: KeyMap,
    high_water: SurrogateKey,
    mode: SyncMode,
) -> DimensionPlan<R> {
    let mut assigner = KeyAssigner::new(known, high_water);
    let mut batch = RecordBatch::new(mode.is_full());
    let mut changed = ChangedKeys::new();
    let mut max_last_update = None;

    for row in rows {
        let decision = assigner.assign(row.natural_key());
        batch.push(decision, R::denormalize(row, decision.key()));
        changed.insert(row.natural_key());
        max_last_update = max_last_update.max(Some(row.last_update()));
    }
    batch.key_high_water = assigner.high_water();

    DimensionPlan {
        batch,
        changed,
        max_last_update,
    }
}

/// Result of one dimension synchronizer run.
#[derive(Debug, Clone)]
pub struct DimensionOutcome {
    pub report: SyncReport,
    pub changed: ChangedKeys,
}

pub async fn sync_dimension<R, S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
) -> Result<DimensionOutcome>
where
    R: SourcedDimension,
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

    let plan = plan_dimension::<R>(&rows, known, high_water, mode);
    let report = SyncReport::new(R::TABLE, rows.len(), plan.batch.len());

    ctx.mirror.apply_records(plan.batch).await?;
    if let Some(ts) = plan.max_last_update {
        ctx.watermarks.set(R::SOURCE_TABLE, ts).await?;
    }

    info!("{report}");
    Ok(DimensionOutcome {
        report,
        changed: plan.changed,
    })
}

/// Changed natural keys of every dimension after the dimension stage.
#[derive(Debug, Clone, Default)]
pub struct ChangedDimensions {
    pub film: ChangedKeys,
    pub actor: ChangedKeys,
    pub category: ChangedKeys,
    pub store: ChangedKeys,
    pub customer: ChangedKeys,
}

/// Run every dimension synchronizer in order.
pub async fn sync_dimensions<S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
) -> Result<(ChangedDimensions, Vec<SyncReport>)>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    let film = sync_dimension::<DimFilm, _, _, _>(ctx, mode).await?;
    let actor = sync_dimension::<DimActor, _, _, _>(ctx, mode).await?;
    let category = sync_dimension::<DimCategory, _, _, _>(ctx, mode).await?;
    let store = sync_dimension::<DimStore, _, _, _>(ctx, mode).await?;
    let customer = sync_dimension::<DimCustomer, _, _, _>(ctx, mode).await?;

    let reports = vec![
        film.report,
        actor.report,
        category.report,
        store.report,
        customer.report,
    ];
    let changed = ChangedDimensions {
        film: film.changed,
        actor: actor.changed,
        category: category.changed,
        store: store.changed,
        customer: customer.changed,
    };
    Ok((changed, reports))
}
