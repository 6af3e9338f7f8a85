//! Natural-to-surrogate key maps for every dimension.

use anyhow::Result;
use star_core::{
    DimActor, DimCategory, DimCustomer, DimFilm, DimStore, DimensionKeys, MirrorStore,
};
use tracing::debug;

/// Scan every dimension table and build its key map.
///
/// Called once per run, after the dimension synchronizers have committed,
/// so the maps include rows created earlier in the same run.
pub async fn build<M: MirrorStore>(mirror: &M) -> Result<DimensionKeys> {
    let keys = DimensionKeys {
        film: mirror.key_map::<DimFilm>().await?,
        actor: mirror.key_map::<DimActor>().await?,
        category: mirror.key_map::<DimCategory>().await?,
        store: mirror.key_map::<DimStore>().await?,
        customer: mirror.key_map::<DimCustomer>().await?,
    };
    debug!(
        films = keys.film.len(),
        actors = keys.actor.len(),
        categories = keys.category.len(),
        stores = keys.store.len(),
        customers = keys.customer.len(),
        "Built dimension key maps"
    );
    Ok(keys)
}
