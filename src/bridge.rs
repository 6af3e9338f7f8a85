//! Bridge synchronizers.
//!
//! Association tables carry no timestamp of their own, so incremental change
//! detection rides on the endpoint dimensions: every bridge row touching a
//! film, actor or category changed in this run is deleted by surrogate key
//! and rebuilt from the source association rows touching the same natural
//! keys. An association removed at the source while both endpoints stay
//! untouched is not noticed until the next full load.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use star_core::{
    AssociationFilter, AssociationRow, BridgeBatch, BridgeFilmActor, BridgeFilmCategory,
    BridgeRecord, ChangedKeys, DimensionKeys, KeyMap, MirrorStore, SourceReader,
};

use crate::context::{SyncContext, SyncMode};
use crate::dimension::ChangedDimensions;
use crate::report::SyncReport;

/// A bridge between films and another dimension, with its source read.
#[async_trait]
pub trait SourcedBridge: BridgeRecord {
    /// Key map of the non-film endpoint.
    fn right_keys(dims: &DimensionKeys) -> &KeyMap;

    /// Changed natural keys of the non-film endpoint.
    fn right_changed(changed: &ChangedDimensions) -> &ChangedKeys;

    async fn read<S: SourceReader>(
        source: &S,
        filter: &AssociationFilter,
    ) -> Result<Vec<AssociationRow>>;
}

#[async_trait]
impl SourcedBridge for BridgeFilmActor {
    fn right_keys(dims: &DimensionKeys) -> &KeyMap {
        &dims.actor
    }

    fn right_changed(changed: &ChangedDimensions) -> &ChangedKeys {
        &changed.actor
    }

    async fn read<S: SourceReader>(
        source: &S,
        filter: &AssociationFilter,
    ) -> Result<Vec<AssociationRow>> {
        source.film_actors(filter).await
    }
}

#[async_trait]
impl SourcedBridge for BridgeFilmCategory {
    fn right_keys(dims: &DimensionKeys) -> &KeyMap {
        &dims.category
    }

    fn right_changed(changed: &ChangedDimensions) -> &ChangedKeys {
        &changed.category
    }

    async fn read<S: SourceReader>(
        source: &S,
        filter: &AssociationFilter,
    ) -> Result<Vec<AssociationRow>> {
        source.film_categories(filter).await
    }
}

/// Bridge rows for every association whose endpoints both resolve.
/// Returns the rows and how many associations were skipped.
fn resolve_pairs<R: SourcedBridge>(
    rows: &[AssociationRow],
    dims: &DimensionKeys,
) -> (Vec<R>, usize) {
    let right_keys = R::right_keys(dims);
    let resolved: Vec<R> = rows
        .iter()
        .filter_map(|row| {
            let left = dims.film.get(row.left)?;
            let right = right_keys.get(row.right)?;
            Some(R::pair(left, right))
        })
        .collect();
    let skipped = rows.len() - resolved.len();
    (resolved, skipped)
}

/// Full rebuild: clear the table and insert every resolvable association.
pub fn plan_rebuild<R: SourcedBridge>(rows: &[AssociationRow], dims: &DimensionKeys) -> BridgeBatch<R> {
    let (inserts, _) = resolve_pairs::<R>(rows, dims);
    BridgeBatch::rebuild(inserts)
}

/// Scoped rebuild around the changed endpoint keys.
///
/// `rows` must be the source associations matching
/// `AssociationFilter::touching(changed_films, changed_right)`.
pub fn plan_scoped<R: SourcedBridge>(
    rows: &[AssociationRow],
    dims: &DimensionKeys,
    changed_films: &ChangedKeys,
    changed_right: &ChangedKeys,
) -> BridgeBatch<R> {
    let (inserts, _) = resolve_pairs::<R>(rows, dims);
    BridgeBatch::scoped(
        dims.film.resolve_all(changed_films),
        R::right_keys(dims).resolve_all(changed_right),
        inserts,
    )
}

pub async fn sync_bridge<R, S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
    dims: &DimensionKeys,
    changed: &ChangedDimensions,
) -> Result<SyncReport>
where
    R: SourcedBridge,
    S: SourceReader,
    M: MirrorStore,
{
    let filter = match mode {
        SyncMode::Full => AssociationFilter::All,
        SyncMode::Incremental => {
            match AssociationFilter::touching(&changed.film, R::right_changed(changed)) {
                Some(filter) => filter,
                None => {
                    let report = SyncReport::empty(R::TABLE);
                    info!("{report}");
                    return Ok(report);
                }
            }
        }
    };

    let rows = R::read(ctx.source, &filter)
        .await
        .with_context(|| format!("Failed to read associations for '{}'", R::TABLE))?;

    let batch = match mode {
        SyncMode::Full => plan_rebuild::<R>(&rows, dims),
        SyncMode::Incremental => {
            plan_scoped::<R>(&rows, dims, &changed.film, R::right_changed(changed))
        }
    };
    let report = SyncReport::new(R::TABLE, rows.len(), batch.inserts.len());

    ctx.mirror.apply_bridge(batch).await?;

    info!("{report}");
    Ok(report)
}

/// Run both bridge synchronizers.
pub async fn sync_bridges<S, M, W>(
    ctx: &SyncContext<'_, S, M, W>,
    mode: SyncMode,
    dims: &DimensionKeys,
    changed: &ChangedDimensions,
) -> Result<Vec<SyncReport>>
where
    S: SourceReader,
    M: MirrorStore,
{
    Ok(vec![
        sync_bridge::<BridgeFilmActor, _, _, _>(ctx, mode, dims, changed).await?,
        sync_bridge::<BridgeFilmCategory, _, _, _>(ctx, mode, dims, changed).await?,
    ])
}
