use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use d_master::LeaseRecord;
use d_master::LockBackend;
use d_master::Master;
use d_master::MasterConfig;
use d_master::SledLockBackend;
use d_master::StorageEngine;
use futures::future::join_all;
use tracing_test::traced_test;

use crate::common::build_master;
use crate::common::hooked_builder;
use crate::common::masters_count;
use crate::common::next_event;
use crate::common::shared_backend;
use crate::common::wait_until;
use crate::common::HookEvents;
use crate::common::HEARTBEAT;

fn storage_config(
    dir: &tempfile::TempDir,
    engine: StorageEngine,
) -> MasterConfig {
    let mut config = MasterConfig::default();
    config.storage.db_path = dir.path().to_path_buf();
    config.storage.scope = "it-scope".to_string();
    config.storage.engine = engine;
    config
}

/// Candidates that only share a `db_path`, each opening its own store.
fn sqlite_candidates(
    dir: &tempfile::TempDir,
    ids: &[&str],
) -> Vec<(Master, HookEvents)> {
    ids.iter()
        .map(|id| {
            let (builder, events) = hooked_builder(id, storage_config(dir, StorageEngine::Sqlite));
            (builder.build().expect("build master"), events)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_sqlite_candidates_on_one_path_elect_single_master() {
    let dir = tempfile::tempdir().unwrap();
    let (masters, _events): (Vec<Master>, Vec<HookEvents>) =
        sqlite_candidates(&dir, &["sql-a", "sql-b", "sql-c"]).into_iter().unzip();

    for master in &masters {
        master.start().unwrap();
    }
    assert!(wait_until(Duration::from_secs(3), || masters_count(&masters) == 1).await);

    // the count stays at one over several heartbeats
    for _ in 0..10 {
        tokio::time::sleep(HEARTBEAT).await;
        assert_eq!(masters_count(&masters), 1);
    }

    let leader = masters.iter().find(|m| m.is_master()).unwrap();
    for master in &masters {
        let holder = master.current_master().await.unwrap().unwrap();
        assert_eq!(holder.holder_id, leader.id());
    }

    join_all(masters.iter().map(|m| m.stop())).await;
    assert_eq!(masters_count(&masters), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_sqlite_follower_takes_over_after_leader_stops() {
    let dir = tempfile::tempdir().unwrap();
    let mut candidates = sqlite_candidates(&dir, &["sql-first", "sql-second"]);
    let (second, mut second_events) = candidates.pop().unwrap();
    let (first, mut first_events) = candidates.pop().unwrap();

    first.start().unwrap();
    assert_eq!(next_event(&mut first_events).await, ("start", 1));
    second.start().unwrap();
    tokio::time::sleep(HEARTBEAT * 2).await;
    assert!(!second.is_master());

    first.stop().await.unwrap();
    assert_eq!(next_event(&mut second_events).await, ("start", 1));
    let holder = first.current_master().await.unwrap().unwrap();
    assert_eq!(holder.holder_id, "sql-second");

    second.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_sled_candidates_sharing_one_store_elect_single_master() {
    let dir = tempfile::tempdir().unwrap();
    let config = storage_config(&dir, StorageEngine::Sled);
    let backend = Arc::new(SledLockBackend::open(&config.storage).unwrap());

    let masters: Vec<Master> = ["sled-a", "sled-b"]
        .iter()
        .map(|id| build_master(id, backend.clone()).0)
        .collect();
    for master in &masters {
        master.start().unwrap();
    }
    assert!(wait_until(Duration::from_secs(3), || masters_count(&masters) == 1).await);

    for _ in 0..6 {
        tokio::time::sleep(HEARTBEAT).await;
        assert_eq!(masters_count(&masters), 1);
    }

    join_all(masters.iter().map(|m| m.stop())).await;
    assert!(backend.read_current().await.unwrap().is_none());
}

/// Two candidates share a store but disagree on the TTL: each judges the
/// abandoned lease with its own settings.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_candidates_judge_staleness_with_their_own_ttl() {
    let backend = shared_backend();
    let mut crashed = LeaseRecord::new("crashed", "it", "10.0.0.9");
    crashed.start_at(SystemTime::now() - Duration::from_millis(350));
    backend.put(crashed);

    // 100ms x 10: the lease is still alive for this candidate
    let (builder, _patient_events) = hooked_builder("patient", MasterConfig::default());
    let patient = builder
        .heartbeat(Duration::from_millis(100))
        .heartbeat_multiplier(10)
        .backend(backend.clone())
        .build()
        .unwrap();
    patient.start().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!patient.is_master());
    assert_eq!(
        backend.read_current().await.unwrap().unwrap().holder_id,
        "crashed"
    );

    // 50ms x 3: already stale for this one
    let (eager, mut eager_events) = build_master("eager", backend.clone());
    eager.start().unwrap();
    assert_eq!(next_event(&mut eager_events).await, ("start", 1));
    assert!(!patient.is_master());

    join_all([patient.stop(), eager.stop()]).await;
}
