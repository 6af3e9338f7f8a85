//! Shared setup for the pipeline tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use star_core::{
    BridgeFilmActor, BridgeFilmCategory, DateRange, DimActor, DimCategory, DimCustomer, DimFilm,
    DimStore, FactPayment, FactRental, MirrorStore,
};
use star_sync::testing::{memory_mirror, sample, MemorySource};
use star_sync::{init, SyncContext};
use surreal_mirror::SurrealMirror;
use watermark::SurrealStore;

pub fn test_dates() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2005, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2006, 12, 31).unwrap(),
    )
    .unwrap()
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("star_sync=debug")
        .try_init()
        .ok();
}

/// Sample source plus an initialized in-memory mirror.
pub async fn setup() -> anyhow::Result<(MemorySource, SurrealMirror, SurrealStore)> {
    init_tracing();
    let source = MemorySource::new(sample());
    let (mirror, watermarks) = memory_mirror().await?;
    init(&SyncContext::new(&source, &mirror, &watermarks), test_dates()).await?;
    Ok((source, mirror, watermarks))
}

/// Every mirror table, for whole-mirror comparisons.
#[derive(Debug, PartialEq)]
pub struct MirrorContents {
    pub films: Vec<DimFilm>,
    pub actors: Vec<DimActor>,
    pub categories: Vec<DimCategory>,
    pub stores: Vec<DimStore>,
    pub customers: Vec<DimCustomer>,
    pub film_actors: Vec<BridgeFilmActor>,
    pub film_categories: Vec<BridgeFilmCategory>,
    pub rentals: Vec<FactRental>,
    pub payments: Vec<FactPayment>,
}

pub async fn contents(mirror: &SurrealMirror) -> anyhow::Result<MirrorContents> {
    Ok(MirrorContents {
        films: mirror.records().await?,
        actors: mirror.records().await?,
        categories: mirror.records().await?,
        stores: mirror.records().await?,
        customers: mirror.records().await?,
        film_actors: mirror.bridge_rows().await?,
        film_categories: mirror.bridge_rows().await?,
        rentals: mirror.records().await?,
        payments: mirror.records().await?,
    })
}
