//! Incremental runs against a mirror that already holds the sample data.

mod common;

use common::{contents, init_tracing, setup, test_dates};
use star_core::{
    BridgeFilmActor, BridgeRecord, DimActor, DimCategory, DimCustomer, FactRental,
    MirrorRecord, MirrorStore,
};
use star_sync::testing::{memory_mirror, sample, sample_time, Customer, MemorySource, Rental};
use star_sync::{full_load, incremental, init, SyncContext};
use watermark::WatermarkStore;

fn written(summary: &star_sync::RunSummary, table: &str) -> usize {
    summary.get(table).map(|r| r.written).unwrap_or_default()
}

#[tokio::test]
async fn test_first_incremental_matches_full_load() -> anyhow::Result<()> {
    let (source, full, full_marks) = setup().await?;
    full_load(&SyncContext::new(&source, &full, &full_marks)).await?;

    let (inc, inc_marks) = memory_mirror().await?;
    let ctx = SyncContext::new(&source, &inc, &inc_marks);
    init(&ctx, test_dates()).await?;
    incremental(&ctx).await?;

    assert_eq!(contents(&inc).await?, contents(&full).await?);
    Ok(())
}

#[tokio::test]
async fn test_new_category_is_mirrored_alone() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;
    incremental(&ctx).await?;

    let at = sample_time(2006, 2, 16, 10, 0, 0);
    source.insert_category(210, "ZZ_TEST", at);
    let summary = incremental(&ctx).await?;

    let category = summary.get(DimCategory::TABLE).unwrap();
    assert_eq!((category.considered, category.written), (1, 1));
    assert_eq!(written(&summary, "dim_film"), 0);
    assert_eq!(written(&summary, "dim_actor"), 0);
    assert_eq!(written(&summary, "bridge_film_category"), 0);
    assert_eq!(written(&summary, "fact_rental"), 0);
    assert!(source
        .reads()
        .contains(&"category since 2006-02-15 04:46:27".to_string()));

    let categories: Vec<DimCategory> = mirror.records().await?;
    assert_eq!(categories.len(), 4);
    let zz = categories.iter().find(|c| c.category_id == 210).unwrap();
    assert_eq!(zz.name, "ZZ_TEST");
    assert_eq!(zz.category_key, 4);
    assert_eq!(watermarks.get("category").await?, Some(at));
    Ok(())
}

#[tokio::test]
async fn test_actor_update_keeps_surrogate_key() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;
    let bridge_before: Vec<BridgeFilmActor> = mirror.bridge_rows().await?;

    assert!(source.update_actor_last_name(2, "SMITH", sample_time(2006, 2, 16, 9, 0, 0)));
    let summary = incremental(&ctx).await?;

    let actors: Vec<DimActor> = mirror.records().await?;
    assert_eq!(actors.len(), 4);
    let nick = actors.iter().find(|a| a.actor_id == 2).unwrap();
    assert_eq!(nick.actor_key, 2);
    assert_eq!(nick.last_name, "SMITH");

    // Film 1 and film 2 both feature actor 2.
    let bridge = summary.get(BridgeFilmActor::TABLE).unwrap();
    assert_eq!((bridge.considered, bridge.written), (2, 2));
    assert_eq!(mirror.bridge_rows::<BridgeFilmActor>().await?, bridge_before);
    Ok(())
}

#[tokio::test]
async fn test_repeated_incremental_is_a_noop() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    incremental(&ctx).await?;
    let before = contents(&mirror).await?;
    let marks: Vec<_> = watermarks
        .list()
        .await?
        .into_iter()
        .map(|w| (w.table_name, w.last_update))
        .collect();

    let summary = incremental(&ctx).await?;
    assert_eq!(summary.written(), 0);
    assert_eq!(contents(&mirror).await?, before);
    let after: Vec<_> = watermarks
        .list()
        .await?
        .into_iter()
        .map(|w| (w.table_name, w.last_update))
        .collect();
    assert_eq!(after, marks);
    assert_eq!(
        watermarks.get("rental").await?,
        Some(sample_time(2006, 2, 15, 21, 30, 53))
    );
    Ok(())
}

#[tokio::test]
async fn test_backdated_change_is_not_picked_up() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    incremental(&ctx).await?;

    // Same timestamp as the stored watermark: not strictly newer.
    source.update_actor_last_name(3, "CHASE-JONES", sample_time(2006, 2, 15, 4, 34, 33));
    let summary = incremental(&ctx).await?;
    assert_eq!(written(&summary, DimActor::TABLE), 0);

    let actors: Vec<DimActor> = mirror.records().await?;
    assert_eq!(actors.iter().find(|a| a.actor_id == 3).unwrap().last_name, "CHASE");
    Ok(())
}

#[tokio::test]
async fn test_orphan_rental_is_retried_until_it_resolves() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;
    incremental(&ctx).await?;

    let orphan_at = sample_time(2006, 2, 16, 10, 0, 0);
    let valid_at = sample_time(2006, 2, 17, 10, 0, 0);
    source.modify(|db| {
        db.rental.insert(
            7,
            Rental {
                rental_date: sample_time(2005, 8, 25, 9, 0, 0),
                return_date: None,
                inventory_id: 1,
                customer_id: 99,
                staff_id: 1,
                last_update: orphan_at,
            },
        );
        db.rental.insert(
            8,
            Rental {
                rental_date: sample_time(2005, 8, 26, 9, 0, 0),
                return_date: None,
                inventory_id: 3,
                customer_id: 1,
                staff_id: 2,
                last_update: valid_at,
            },
        );
    });

    for _ in 0..2 {
        let summary = incremental(&ctx).await?;
        let rentals = summary.get(FactRental::TABLE).unwrap();
        assert_eq!((rentals.considered, rentals.written, rentals.skipped), (2, 1, 1));
        assert_eq!(summary.skipped(), 1);

        let mark = watermarks.get("rental").await?.unwrap();
        assert!(mark < orphan_at);
        assert!(mark > sample_time(2006, 2, 15, 21, 30, 53));
        assert_eq!(mirror.count(FactRental::TABLE).await?, 7);
    }

    source.modify(|db| {
        db.customer.insert(
            99,
            Customer {
                first_name: "GUEST".into(),
                last_name: "WALKIN".into(),
                active: true,
                address_id: 6,
                last_update: sample_time(2006, 2, 18, 8, 0, 0),
            },
        )
    });
    let summary = incremental(&ctx).await?;
    assert_eq!(written(&summary, DimCustomer::TABLE), 1);
    let rentals = summary.get(FactRental::TABLE).unwrap();
    assert_eq!((rentals.written, rentals.skipped), (2, 0));
    assert_eq!(watermarks.get("rental").await?, Some(valid_at));

    let facts: Vec<FactRental> = mirror.records().await?;
    assert_eq!(facts.len(), 8);
    let customers = mirror.key_map::<DimCustomer>().await?;
    let seven = facts.iter().find(|f| f.rental_id == 7).unwrap();
    assert_eq!(Some(seven.customer_key), customers.get(99));
    Ok(())
}

#[tokio::test]
async fn test_removed_association_needs_a_touched_endpoint() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;

    // Neither film 3 nor actor 3 changes, so incremental cannot see this.
    assert!(source.remove_film_actor(3, 3));
    let summary = incremental(&ctx).await?;
    assert_eq!(written(&summary, BridgeFilmActor::TABLE), 0);
    assert_eq!(mirror.count(BridgeFilmActor::TABLE).await?, 7);

    // Touching the film scopes the rebuild around it.
    assert!(source.remove_film_actor(2, 3));
    assert!(source.touch_film(2, sample_time(2006, 2, 16, 12, 0, 0)));
    incremental(&ctx).await?;
    assert_eq!(mirror.count(BridgeFilmActor::TABLE).await?, 6);

    // A full load closes the remaining gap.
    full_load(&ctx).await?;
    assert_eq!(mirror.count(BridgeFilmActor::TABLE).await?, 5);
    Ok(())
}

#[tokio::test]
async fn test_incremental_converges_with_full_load() -> anyhow::Result<()> {
    let (source, mirror, watermarks) = setup().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    full_load(&ctx).await?;

    let at = sample_time(2006, 2, 20, 8, 0, 0);
    source.insert_category(210, "ZZ_TEST", at);
    source.update_actor_last_name(4, "DAVIS-GUINESS", at);
    source.add_film_actor(5, 4);
    source.touch_film(5, at);
    source.modify(|db| {
        db.customer.insert(
            5,
            Customer {
                first_name: "ELIZABETH".into(),
                last_name: "BROWN".into(),
                active: true,
                address_id: 7,
                last_update: at,
            },
        );
        db.rental.insert(
            7,
            Rental {
                rental_date: sample_time(2005, 8, 28, 14, 0, 0),
                return_date: None,
                inventory_id: 5,
                customer_id: 5,
                staff_id: 2,
                last_update: at,
            },
        );
    });
    incremental(&ctx).await?;

    let fresh = MemorySource::new(source.snapshot());
    let (reference, reference_marks) = memory_mirror().await?;
    let reference_ctx = SyncContext::new(&fresh, &reference, &reference_marks);
    init(&reference_ctx, test_dates()).await?;
    full_load(&reference_ctx).await?;

    assert_eq!(contents(&mirror).await?, contents(&reference).await?);
    Ok(())
}

#[tokio::test]
async fn test_failed_run_leaves_watermarks_alone() -> anyhow::Result<()> {
    init_tracing();
    let source = MemorySource::new(sample());
    let (mirror, watermarks) = memory_mirror().await?;
    let ctx = SyncContext::new(&source, &mirror, &watermarks);
    init(&ctx, test_dates()).await?;

    source.set_offline(true);
    assert!(incremental(&ctx).await.is_err());
    assert!(watermarks.list().await?.iter().all(|w| w.last_update.is_none()));
    assert!(mirror.records::<DimCategory>().await?.is_empty());

    source.set_offline(false);
    incremental(&ctx).await?;
    assert_eq!(
        mirror.records::<DimCategory>().await?.len(),
        sample().category.len()
    );
    Ok(())
}
