use crate::filter::FilterSpec;
use crate::publisher::{Publisher, StaticTargets, Target};
use rusqlite::Connection;
use std::sync::Arc;
use tempfile::tempdir;

fn setup_source(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE config (id INTEGER PRIMARY KEY, v TEXT);
         INSERT INTO config VALUES (1, 'hello');",
    )
    .unwrap();
}

#[tokio::test]
async fn publish_skips_noop_targets_and_dedups_unchanged_hash() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("source.db");
    let hot_copy_path = dir.path().join("hot.db");
    setup_source(&source_path);

    // A "noop" target should never be pushed to, so an unreachable address
    // here must not cause `publish` to fail.
    let targets = Arc::new(StaticTargets(vec![Target {
        name: "dbsync:replica-a".to_string(),
        strategy: "noop".to_string(),
        endpoint: "127.0.0.1:1".parse().unwrap(),
    }]));

    let filter = FilterSpec { full_tables: vec!["config".to_string()], ..Default::default() };
    let publisher = Publisher::new(source_path.clone(), hot_copy_path.clone(), filter, targets).unwrap();

    publisher.publish().await.unwrap();
    assert!(hot_copy_path.exists());

    // Second publish against an unchanged source should dedup against the
    // last hash and be a cheap no-op (still succeeds).
    publisher.publish().await.unwrap();
}

#[tokio::test]
async fn publish_produces_a_new_snapshot_after_source_changes() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("source.db");
    let hot_copy_path = dir.path().join("hot.db");
    setup_source(&source_path);

    let targets = Arc::new(StaticTargets(Vec::new()));
    let filter = FilterSpec { full_tables: vec!["config".to_string()], ..Default::default() };
    let publisher = Publisher::new(source_path.clone(), hot_copy_path.clone(), filter, targets).unwrap();

    publisher.publish().await.unwrap();
    let first_hash = std::fs::read(&hot_copy_path).unwrap();

    let conn = Connection::open(&source_path).unwrap();
    conn.execute("INSERT INTO config VALUES (2, 'world')", []).unwrap();
    drop(conn);

    publisher.publish().await.unwrap();
    let second_hash = std::fs::read(&hot_copy_path).unwrap();
    assert_ne!(first_hash, second_hash);
}
