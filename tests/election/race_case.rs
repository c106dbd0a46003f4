use std::time::Duration;

use d_master::LockBackend;
use futures::future::join_all;
use tokio::time::sleep;
use tracing_test::traced_test;

use crate::common::build_master;
use crate::common::masters_count;
use crate::common::shared_backend;
use crate::common::wait_until;
use crate::common::HEARTBEAT;

/// Two candidates start at the same moment on one backend; exactly one
/// becomes master within the first tick and it stays that way.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_two_candidates_racing_start_elect_one_master() {
    let backend = shared_backend();
    let (a, _a_events) = build_master("race-a", backend.clone());
    let (b, _b_events) = build_master("race-b", backend.clone());
    let masters = vec![a.clone(), b.clone()];

    a.start().unwrap();
    b.start().unwrap();

    assert!(wait_until(HEARTBEAT, || masters_count(&masters) == 1).await);

    for _ in 0..10 {
        sleep(HEARTBEAT / 2).await;
        assert_eq!(masters_count(&masters), 1);
    }

    let leader = masters.iter().find(|m| m.is_master()).unwrap();
    let holder = backend.read_current().await.unwrap().unwrap();
    assert_eq!(holder.holder_id, leader.id());
    assert_eq!(leader.epoch(), 1);

    let results = join_all(masters.iter().map(|m| m.stop())).await;
    assert!(results.into_iter().all(|r| r.is_ok()));
    assert!(backend.read_current().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_many_candidates_never_share_the_lease() {
    let backend = shared_backend();
    let masters: Vec<_> = (0..6)
        .map(|i| build_master(&format!("crowd-{i}"), backend.clone()).0)
        .collect();

    for m in &masters {
        m.start().unwrap();
    }

    assert!(wait_until(HEARTBEAT * 2, || masters_count(&masters) == 1).await);
    for _ in 0..20 {
        assert!(masters_count(&masters) <= 1);
        sleep(Duration::from_millis(10)).await;
    }

    let holder = backend.read_current().await.unwrap().unwrap();
    let leader = masters.iter().find(|m| m.is_master()).unwrap();
    assert_eq!(holder.holder_id, leader.id());
    for m in masters.iter().filter(|m| !m.is_master()) {
        assert_eq!(m.epoch(), 0);
        assert_eq!(
            m.current_master().await.unwrap().map(|r| r.holder_id),
            Some(leader.id().to_string())
        );
    }

    join_all(masters.iter().map(|m| m.stop())).await;
}
