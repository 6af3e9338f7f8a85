//! The `init` command against an in-memory mirror.

mod common;

use common::{init_tracing, setup, test_dates};
use chrono::NaiveDate;
use star_core::{DateRange, MirrorStore};
use star_sync::testing::{memory_mirror, sample, MemorySource};
use star_sync::{full_load, init, SyncContext};
use watermark::{WatermarkStore, TRACKED_TABLES};

#[tokio::test]
async fn test_init_populates_dates_and_watermarks() -> anyhow::Result<()> {
    init_tracing();
    let source = MemorySource::new(sample());
    let (mirror, watermarks) = memory_mirror().await?;

    let summary = init(&SyncContext::new(&source, &mirror, &watermarks), test_dates()).await?;
    assert_eq!(summary.dates, 610);
    assert_eq!(summary.watermarks, TRACKED_TABLES.len());
    assert_eq!(mirror.count("dim_date").await?, 610);

    let rows = watermarks.list().await?;
    assert_eq!(rows.len(), 15);
    assert!(rows.iter().all(|w| w.last_update.is_none()));

    let day = mirror.date(20050524).await?.unwrap();
    assert_eq!(day.date, NaiveDate::from_ymd_opt(2005, 5, 24).unwrap());
    assert!(mirror.date(20040101).await?.is_none());
    assert!(mirror.date(20070101).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_init_twice_keeps_watermarks() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;
    let film = watermarks.get("film").await?;
    assert!(film.is_some());

    init(&ctx, test_dates()).await?;
    assert_eq!(watermarks.get("film").await?, film);
    assert_eq!(mirror.count("dim_date").await?, 610);
    assert_eq!(mirror.count("dim_film").await?, 5);
    Ok(())
}

#[tokio::test]
async fn test_init_extends_the_date_range() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let wider = DateRange::new(
        NaiveDate::from_ymd_opt(2004, 12, 31).unwrap(),
        NaiveDate::from_ymd_opt(2006, 12, 31).unwrap(),
    )?;
    init(&SyncContext::new(&source, &mirror, &watermarks), wider).await?;
    assert_eq!(mirror.count("dim_date").await?, 731);
    assert!(mirror.date(20041231).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_stops_init() -> anyhow::Result<()> {
    init_tracing();
    let source = MemorySource::new(sample());
    source.set_offline(true);
    let (mirror, watermarks) = memory_mirror().await?;

    let err = init(&SyncContext::new(&source, &mirror, &watermarks), test_dates())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Source connectivity check failed"));
    assert!(watermarks.list().await?.is_empty());
    Ok(())
}
