use std::time::Duration;
use std::time::SystemTime;

use d_master::LeaseRecord;
use d_master::LockBackend;
use tracing_test::traced_test;

use crate::common::build_master;
use crate::common::next_event;
use crate::common::shared_backend;
use crate::common::wait_until;
use crate::common::HEARTBEAT;
use crate::common::MULTIPLIER;

/// The leader's record disappears underneath it: the next renewal fails,
/// the leader steps down and reports the epoch it lost.
#[tokio::test]
#[traced_test]
async fn test_leader_demotes_when_its_lease_is_taken_away() {
    let backend = shared_backend();
    let (master, mut events) = build_master("victim", backend.clone());

    master.start().unwrap();
    assert_eq!(next_event(&mut events).await, ("start", 1));
    assert!(master.is_master());

    // An operator clears the scope out of band
    assert!(backend.release("victim").await.unwrap());

    assert_eq!(next_event(&mut events).await, ("stop", 1));
    // Nobody else competes, so the same candidate wins a new tenure
    assert_eq!(next_event(&mut events).await, ("start", 2));
    assert_eq!(master.epoch(), 2);

    master.stop().await.unwrap();
    assert_eq!(next_event(&mut events).await, ("stop", 2));
}

#[tokio::test]
#[traced_test]
async fn test_leader_demotes_during_backend_outage_and_recovers() {
    let backend = shared_backend();
    let (master, mut events) = build_master("flaky", backend.clone());

    master.start().unwrap();
    assert_eq!(next_event(&mut events).await, ("start", 1));

    backend.set_available(false);
    assert_eq!(next_event(&mut events).await, ("stop", 1));
    assert!(!master.is_master());
    assert!(master.lease().is_cleared());

    // Failed acquisitions while offline are retried, never fatal
    tokio::time::sleep(HEARTBEAT * 3).await;
    assert!(!master.is_master());
    assert!(master.is_started());

    backend.set_available(true);
    assert_eq!(next_event(&mut events).await, ("start", 2));
    assert!(master.is_master());

    master.stop().await.unwrap();
}

/// A crashed holder stopped heartbeating 350ms ago, well past the 150ms
/// TTL: a new candidate takes the lease on its first step.
#[tokio::test]
#[traced_test]
async fn test_stale_lease_of_crashed_holder_is_taken_over() {
    let backend = shared_backend();
    let mut crashed = LeaseRecord::new("crashed", "it", "10.0.0.9");
    crashed.start_at(SystemTime::now() - Duration::from_millis(350));
    backend.put(crashed);

    let (master, mut events) = build_master("successor", backend.clone());
    master.start().unwrap();

    assert_eq!(next_event(&mut events).await, ("start", 1));
    let holder = backend.read_current().await.unwrap().unwrap();
    assert_eq!(holder.holder_id, "successor");

    master.stop().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_live_lease_blocks_until_holder_goes_silent() {
    let backend = shared_backend();
    let mut holder = LeaseRecord::new("silent", "it", "10.0.0.8");
    holder.start_at(SystemTime::now());
    backend.put(holder);

    let (master, _events) = build_master("patient", backend.clone());
    master.start().unwrap();

    tokio::time::sleep(HEARTBEAT).await;
    assert!(!master.is_master());

    // Once the TTL has passed without heartbeats the lease is up for grabs
    let ttl = HEARTBEAT * MULTIPLIER;
    assert!(wait_until(ttl * 2, || master.is_master()).await);

    master.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn test_follower_takes_over_after_leader_stops() {
    let backend = shared_backend();
    let (first, mut first_events) = build_master("first", backend.clone());
    first.start().unwrap();
    assert_eq!(next_event(&mut first_events).await, ("start", 1));

    let (second, mut second_events) = build_master("second", backend.clone());
    second.start().unwrap();
    tokio::time::sleep(HEARTBEAT * 2).await;
    assert!(!second.is_master());

    first.stop().await.unwrap();
    assert_eq!(next_event(&mut first_events).await, ("stop", 1));

    // The lease was released, so no TTL wait is needed
    assert_eq!(next_event(&mut second_events).await, ("start", 1));
    let holder = backend.read_current().await.unwrap().unwrap();
    assert_eq!(holder.holder_id, "second");

    second.stop().await.unwrap();
}
