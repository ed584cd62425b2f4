mod support;

use std::collections::HashSet;
use std::time::Duration;

use config::shared::PipelineMode;
use etl::destination::Destination;
use etl::destination::file::FileDestination;
use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::pipeline::Pipeline;
use etl::source::{DirectorySource, MemorySource};
use etl::state::table::PipelinePhase;
use etl::store::checkpoint::CheckpointStore;
use etl::store::checkpoint::file::FileCheckpointStore;
use etl::store::checkpoint::memory::MemoryCheckpointStore;
use etl::types::{Cell, UnitId};
use telemetry::tracing::init_test_tracing;

use support::{
    FaultyCheckpointStore, FaultyDestination, LEADERBOARDS, MAPS, cell_of, leaderboard_record,
    map_record, maps_registry, pipeline_config, registry, wait_for_phase, wait_for_rows,
};

#[tokio::test(flavor = "multi_thread")]
async fn latest_record_of_an_entity_wins_within_a_unit() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(
            LEADERBOARDS,
            "u1",
            vec![
                leaderboard_record(1, Some("2024-05-01T12:05:00Z"), 20.0),
                leaderboard_record(1, Some("2024-05-01T12:00:00Z"), 10.0),
                leaderboard_record(2, Some("2024-05-01T12:00:00Z"), 3.0),
            ],
        )
        .await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        registry(),
        source,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    let leaderboards = &summaries[0];
    assert_eq!(leaderboards.table, LEADERBOARDS);
    assert_eq!(leaderboards.units_merged, 1);
    assert_eq!(leaderboards.rows_inserted, 2);

    let table = registry().get_table(LEADERBOARDS).unwrap();
    let snapshot = destination.read_snapshot(LEADERBOARDS).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(cell_of(&snapshot, &table, 1, "Kills"), Cell::F64(20.0));
    assert_eq!(cell_of(&snapshot, &table, 2, "Kills"), Cell::F64(3.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn record_without_recency_loses_to_a_timestamped_one() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(
            LEADERBOARDS,
            "u1",
            vec![
                leaderboard_record(1, Some("2024-05-01T12:00:00Z"), 5.0),
                leaderboard_record(1, None, 9.0),
            ],
        )
        .await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        registry(),
        source,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    pipeline.wait().await.unwrap();

    let table = registry().get_table(LEADERBOARDS).unwrap();
    let snapshot = destination.read_snapshot(LEADERBOARDS).await.unwrap();
    assert_eq!(cell_of(&snapshot, &table, 1, "Kills"), Cell::F64(5.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn later_units_replace_existing_rows() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live"), map_record(2, "live")])
        .await;
    source
        .add_unit(
            MAPS,
            "u2",
            vec![map_record(1, "finished"), map_record(3, "upcoming")],
        )
        .await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].units_merged, 2);
    assert_eq!(summaries[0].rows_inserted, 3);
    assert_eq!(summaries[0].rows_updated, 1);

    let table = maps_registry().get_table(MAPS).unwrap();
    let snapshot = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.version(), 2);
    assert_eq!(
        cell_of(&snapshot, &table, 1, "Status"),
        Cell::String("finished".to_owned())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn replaying_units_leaves_the_table_unchanged() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live"), map_record(2, "live")])
        .await;
    source
        .add_unit(MAPS, "u2", vec![map_record(2, "finished")])
        .await;

    let destination = FileDestination::new(dir.path()).await.unwrap();
    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    pipeline.wait().await.unwrap();
    let first = destination.read_snapshot(MAPS).await.unwrap();

    // A fresh checkpoint makes the second run read every unit again.
    let reopened = FileDestination::new(dir.path()).await.unwrap();
    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        reopened.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();
    let second = reopened.read_snapshot(MAPS).await.unwrap();

    assert_eq!(summaries[0].units_merged, 2);
    assert_eq!(summaries[0].rows_inserted, 0);
    assert!(first.rows().eq(second.rows()));
}

#[tokio::test(flavor = "multi_thread")]
async fn unit_with_schema_mismatch_is_skipped_durably() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    source
        .add_unit(
            MAPS,
            "u2",
            vec![
                map_record(9, "live"),
                serde_json::json!({"Number": "nine", "Status": "live"}),
            ],
        )
        .await;
    source
        .add_unit(MAPS, "u3", vec![map_record(2, "live")])
        .await;
    let destination = MemoryDestination::new();
    let store = MemoryCheckpointStore::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 2);
    assert_eq!(summaries[0].units_skipped, 1);

    let snapshot = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(snapshot.len(), 2);

    let checkpoint = store.load_checkpoint(MAPS).await.unwrap();
    assert_eq!(
        checkpoint.skipped.get(&UnitId::new("u2")).map(String::as_str),
        Some("schema_mismatch")
    );

    // A restart does not read the skipped unit again.
    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination,
        store,
    );
    pipeline.start().await.unwrap();
    pipeline.wait().await.unwrap();
    assert_eq!(source.read_count(MAPS, "u2").await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_after_failed_checkpoint_converges() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live"), map_record(2, "live")])
        .await;
    let destination = MemoryDestination::new();
    let store = MemoryCheckpointStore::new();

    // The merge commits but recording it fails, as if the process died in between.
    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        FaultyCheckpointStore::wrap(store.clone(), 1),
    );
    pipeline.start().await.unwrap();
    let err = pipeline.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CheckpointWriteFailure);

    let after_crash = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(after_crash.len(), 2);
    assert!(!store.is_processed(MAPS, &UnitId::new("u1")).await.unwrap());

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    let after_restart = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(summaries[0].units_merged, 1);
    assert!(after_crash.rows().eq(after_restart.rows()));
    assert!(store.is_processed(MAPS, &UnitId::new("u1")).await.unwrap());
    assert_eq!(source.read_count(MAPS, "u1").await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_read_failures_are_retried() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    source.fail_reads(MAPS, "u1", 2).await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(summaries[0].units_skipped, 0);
    assert_eq!(source.read_count(MAPS, "u1").await, 3);
    assert_eq!(destination.read_snapshot(MAPS).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_unit_is_skipped_until_restart() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    source
        .add_unit(MAPS, "u2", vec![map_record(2, "live")])
        .await;
    // As many failures as the configured attempts.
    source.fail_reads(MAPS, "u1", 3).await;
    let destination = MemoryDestination::new();
    let store = MemoryCheckpointStore::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(summaries[0].units_skipped, 1);
    assert_eq!(source.read_count(MAPS, "u1").await, 3);
    assert!(!store.load_checkpoint(MAPS).await.unwrap().contains(&UnitId::new("u1")));

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(destination.read_snapshot(MAPS).await.unwrap().len(), 2);
    assert!(store.is_processed(MAPS, &UnitId::new("u1")).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn unit_merged_after_restart_overwrites_newer_rows() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    source
        .add_unit(MAPS, "u2", vec![map_record(1, "finished")])
        .await;
    source.fail_reads(MAPS, "u1", 3).await;
    let destination = MemoryDestination::new();
    let store = MemoryCheckpointStore::new();
    let table = maps_registry().get_table(MAPS).unwrap();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    pipeline.wait().await.unwrap();

    let snapshot = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(
        cell_of(&snapshot, &table, 1, "Status"),
        Cell::String("finished".to_owned())
    );

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    // Merge upserts by key, the late unit replaces the row of the newer one.
    let snapshot = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(summaries[0].rows_updated, 1);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        cell_of(&snapshot, &table, 1, "Status"),
        Cell::String("live".to_owned())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_conflicts_are_retried() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    let destination = FaultyDestination::wrap(MemoryDestination::new());
    destination
        .fail_next_upserts(MAPS, 2, ErrorKind::MergeConflict)
        .await;
    let store = MemoryCheckpointStore::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(destination.upsert_attempts(MAPS).await, 3);
    assert!(store.is_processed(MAPS, &UnitId::new("u1")).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_merge_retries_halt_only_that_table() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(
            LEADERBOARDS,
            "u1",
            vec![leaderboard_record(1, Some("2024-05-01T12:00:00Z"), 1.0)],
        )
        .await;
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    let destination = FaultyDestination::wrap(MemoryDestination::new());
    destination
        .fail_next_upserts(LEADERBOARDS, 10, ErrorKind::WriteFailure)
        .await;
    let store = MemoryCheckpointStore::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        registry(),
        source,
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let mut leaderboards_phase = pipeline.workers()[0].subscribe();
    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert_eq!(destination.upsert_attempts(LEADERBOARDS).await, 3);
    assert_eq!(
        wait_for_phase(&mut leaderboards_phase, |phase| *phase == PipelinePhase::Stopped).await,
        PipelinePhase::Stopped
    );

    assert!(destination.read_snapshot(LEADERBOARDS).await.unwrap().is_empty());
    assert!(!store.is_processed(LEADERBOARDS, &UnitId::new("u1")).await.unwrap());

    assert_eq!(destination.read_snapshot(MAPS).await.unwrap().len(), 1);
    assert!(store.is_processed(MAPS, &UnitId::new("u1")).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn every_table_is_merged() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(
            LEADERBOARDS,
            "2024-05-01T12-00",
            vec![
                leaderboard_record(1, Some("2024-05-01T12:00:00Z"), 1.0),
                leaderboard_record(2, Some("2024-05-01T12:00:00Z"), 2.0),
            ],
        )
        .await;
    source
        .add_unit(MAPS, "2024-05-01T12-00", vec![map_record(1, "live")])
        .await;
    source
        .add_unit(MAPS, "2024-05-01T12-05", vec![map_record(1, "finished")])
        .await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        registry(),
        source,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    assert_eq!(pipeline.workers().len(), 2);
    let summaries = pipeline.wait().await.unwrap();

    let merged: Vec<(&str, u64)> = summaries
        .iter()
        .map(|summary| (summary.table.as_str(), summary.units_merged))
        .collect();
    assert_eq!(merged, vec![(LEADERBOARDS, 1), (MAPS, 2)]);

    assert_eq!(destination.read_snapshot(LEADERBOARDS).await.unwrap().len(), 2);
    assert_eq!(destination.read_snapshot(MAPS).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn starting_twice_is_rejected() {
    init_test_tracing();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        MemorySource::new(),
        MemoryDestination::new(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();

    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    pipeline.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_pipeline_merges_new_units_until_shutdown() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_unit(MAPS, "u1", vec![map_record(1, "live")])
        .await;
    let destination = MemoryDestination::new();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Stream),
        maps_registry(),
        source.clone(),
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let mut phase = pipeline.workers()[0].subscribe();

    wait_for_rows(&destination, MAPS, 1).await;

    source
        .add_unit(MAPS, "u2", vec![map_record(2, "live")])
        .await;
    pipeline.arrivals().notify();
    wait_for_rows(&destination, MAPS, 2).await;

    // The worker keeps waiting for more units instead of stopping.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_ne!(*phase.borrow_and_update(), PipelinePhase::Stopped);

    let summaries = pipeline.shutdown_and_wait().await.unwrap();
    assert_eq!(summaries[0].units_merged, 2);
    assert_eq!(*phase.borrow(), PipelinePhase::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn readers_only_see_fully_merged_units() {
    init_test_tracing();

    const UNITS: usize = 30;
    const ROWS: i32 = 20;

    let source = MemorySource::new();
    for unit in 0..UNITS {
        let status = format!("unit-{unit:02}");
        let records = (0..ROWS).map(|number| map_record(number, &status)).collect();
        source
            .add_unit(MAPS, format!("u{unit:02}"), records)
            .await;
    }
    let destination = MemoryDestination::new();
    destination
        .ensure_table(&maps_registry().get_table(MAPS).unwrap())
        .await
        .unwrap();

    let reader = {
        let destination = destination.clone();
        tokio::spawn(async move {
            let table = maps_registry().get_table(MAPS).unwrap();
            let status = table.schema().column_index("Status").unwrap();
            let mut last_version = 0;

            loop {
                let snapshot = destination.read_snapshot(MAPS).await.unwrap();
                assert!(snapshot.version() >= last_version);
                last_version = snapshot.version();

                if snapshot.is_empty() {
                    tokio::task::yield_now().await;
                    continue;
                }

                // Every row of a unit carries the same status, a mix means a partial merge.
                let statuses: HashSet<Cell> = snapshot
                    .rows()
                    .map(|row| row.get(status).cloned().unwrap())
                    .collect();
                assert_eq!(snapshot.len(), ROWS as usize);
                assert_eq!(statuses.len(), 1);

                if snapshot.version() == UNITS as u64 {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        destination.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summaries[0].units_merged, UNITS as u64);
    assert_eq!(summaries[0].rows_updated, ((UNITS - 1) * ROWS as usize) as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn durable_pipeline_resumes_from_its_checkpoint() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw").join(MAPS);
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(
        raw.join("2024-05-01T12-00.json"),
        format!("{}\n{}\n", map_record(1, "live"), map_record(2, "live")),
    )
    .unwrap();
    // In-flight files of the collector are ignored.
    std::fs::write(raw.join(".2024-05-01T12-05.json"), "{").unwrap();

    let source = DirectorySource::new(dir.path().join("raw"));
    let destination = FileDestination::new(dir.path().join("warehouse")).await.unwrap();
    let store = FileCheckpointStore::new(dir.path().join("checkpoints")).await.unwrap();

    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source.clone(),
        destination,
        store,
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();
    assert_eq!(summaries[0].units_merged, 1);

    std::fs::write(
        raw.join("2024-05-01T12-05.json"),
        format!("{}\n", map_record(2, "finished")),
    )
    .unwrap();

    let destination = FileDestination::new(dir.path().join("warehouse")).await.unwrap();
    let store = FileCheckpointStore::new(dir.path().join("checkpoints")).await.unwrap();
    let mut pipeline = Pipeline::new(
        pipeline_config(PipelineMode::Drain),
        maps_registry(),
        source,
        destination.clone(),
        store.clone(),
    );
    pipeline.start().await.unwrap();
    let summaries = pipeline.wait().await.unwrap();

    assert_eq!(summaries[0].units_merged, 1);
    assert_eq!(summaries[0].rows_updated, 1);

    let table = maps_registry().get_table(MAPS).unwrap();
    let snapshot = destination.read_snapshot(MAPS).await.unwrap();
    assert_eq!(snapshot.version(), 2);
    assert_eq!(
        cell_of(&snapshot, &table, 2, "Status"),
        Cell::String("finished".to_owned())
    );

    let checkpoint = store.load_checkpoint(MAPS).await.unwrap();
    assert_eq!(checkpoint.processed.len(), 2);
    assert_eq!(checkpoint.next_batch_id, 2);
}
