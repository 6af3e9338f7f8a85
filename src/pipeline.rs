//! The four commands as library functions.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{info, warn};

use star_core::{DateRange, MirrorStore, SourceReader};
use watermark::{WatermarkStore, TRACKED_TABLES};

use crate::bridge::sync_bridges;
use crate::context::{SyncContext, SyncMode};
use crate::dimension::sync_dimensions;
use crate::fact::sync_facts;
use crate::key_map;
use crate::reconcile::{reconcile, ReconcileReport, ValidateOptions};
use crate::report::RunSummary;

/// Outcome of a command once the source connection is closed.
///
/// A failed disconnect is only logged, so it never hides the command's own
/// error.
pub fn after_disconnect<T>(result: Result<T>, closed: Result<()>) -> Result<T> {
    if let Err(e) = closed {
        warn!("Failed to close source connection: {e:#}");
    }
    result
}

/// What `init` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSummary {
    pub dates: usize,
    pub watermarks: usize,
}

/// Check the source is reachable, create the mirror schema, populate the date
/// dimension and seed an empty watermark row per tracked table.
///
/// Safe to run again: existing watermarks and date rows are kept.
pub async fn init<S, M, W>(ctx: &SyncContext<'_, S, M, W>, dates: DateRange) -> Result<InitSummary>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    ctx.source
        .ping()
        .await
        .context("Source connectivity check failed")?;
    info!("Source connection OK");

    ctx.mirror.define_schema().await?;
    info!("Mirror schema defined");

    let dates = ctx.mirror.populate_dates(dates.records()).await?;
    info!("dim_date: {dates} days populated");

    for table in TRACKED_TABLES {
        ctx.watermarks.seed(table).await?;
    }
    info!("sync_state: {} tables tracked", TRACKED_TABLES.len());

    Ok(InitSummary {
        dates,
        watermarks: TRACKED_TABLES.len(),
    })
}

/// Dimensions, then bridges and facts against key maps built after the
/// dimensions committed.
async fn run<S, M, W>(ctx: &SyncContext<'_, S, M, W>, mode: SyncMode) -> Result<RunSummary>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    let mut summary = RunSummary::default();

    let (changed, reports) = sync_dimensions(ctx, mode).await?;
    reports.into_iter().for_each(|r| summary.push(r));

    let dims = key_map::build(ctx.mirror).await?;

    for report in sync_bridges(ctx, mode, &dims, &changed).await? {
        summary.push(report);
    }
    for report in sync_facts(ctx, mode, &dims).await? {
        summary.push(report);
    }

    info!(
        "{mode:?} load finished: {} rows written, {} skipped",
        summary.written(),
        summary.skipped()
    );
    Ok(summary)
}

/// Rebuild every mirror table from the whole source.
pub async fn full_load<S, M, W>(ctx: &SyncContext<'_, S, M, W>) -> Result<RunSummary>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    info!("Starting full load");
    run(ctx, SyncMode::Full).await
}

/// Apply source changes since each table's watermark.
pub async fn incremental<S, M, W>(ctx: &SyncContext<'_, S, M, W>) -> Result<RunSummary>
where
    S: SourceReader,
    M: MirrorStore,
    W: WatermarkStore,
{
    info!("Starting incremental load");
    run(ctx, SyncMode::Incremental).await
}

/// Reconcile source and mirror over the trailing window ending at `now`.
pub async fn validate<S, M>(
    source: &S,
    mirror: &M,
    opts: ValidateOptions,
    now: NaiveDateTime,
) -> Result<ReconcileReport>
where
    S: SourceReader,
    M: MirrorStore,
{
    reconcile(source, mirror, opts, now).await
}
