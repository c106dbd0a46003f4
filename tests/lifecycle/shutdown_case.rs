use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
use d_master::LeaseRecord;
use d_master::LockBackend;
use d_master::MemLockBackend;
use d_master::Result;
use d_master::StalenessChecker;
use tokio::time::sleep;
use tracing_test::traced_test;

use crate::common::build_master;
use crate::common::next_event;
use crate::common::shared_backend;
use crate::common::HEARTBEAT;

/// Lock store whose acquisitions take a long time, to observe how stopping
/// interacts with a step in flight.
struct SlowBackend {
    inner: MemLockBackend,
    delay: Duration,
    in_flight: AtomicBool,
    acquisitions: AtomicUsize,
}

impl SlowBackend {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemLockBackend::new(),
            delay,
            in_flight: AtomicBool::new(false),
            acquisitions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LockBackend for SlowBackend {
    async fn try_acquire(
        &self,
        candidate: &LeaseRecord,
        now: SystemTime,
        checker: &StalenessChecker,
    ) -> Result<bool> {
        self.in_flight.store(true, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        let acquired = self.inner.try_acquire(candidate, now, checker).await;
        self.in_flight.store(false, Ordering::SeqCst);
        acquired
    }

    async fn release(
        &self,
        candidate_id: &str,
    ) -> Result<bool> {
        self.inner.release(candidate_id).await
    }

    async fn renew_heartbeat(
        &self,
        candidate_id: &str,
    ) -> Result<SystemTime> {
        self.inner.renew_heartbeat(candidate_id).await
    }

    async fn read_current(&self) -> Result<Option<LeaseRecord>> {
        self.inner.read_current().await
    }
}

#[tokio::test]
#[traced_test]
async fn test_stop_waits_for_in_flight_step_then_releases() {
    let backend = Arc::new(SlowBackend::new(Duration::from_millis(300)));
    let (master, mut events) = build_master("slow", backend.clone());

    master.start().unwrap();
    sleep(Duration::from_millis(30)).await;
    assert!(backend.in_flight.load(Ordering::SeqCst));

    master.stop().await.unwrap();

    assert!(!backend.in_flight.load(Ordering::SeqCst));
    assert!(!master.is_master());
    // The acquisition that finished during shutdown was given back
    assert!(backend.read_current().await.unwrap().is_none());
    // Both hooks are submitted back to back, so their order is not fixed
    let mut fired = vec![next_event(&mut events).await, next_event(&mut events).await];
    fired.sort();
    assert_eq!(fired, vec![("start", 1), ("stop", 1)]);

    let calls = backend.acquisitions.load(Ordering::SeqCst);
    sleep(HEARTBEAT * 4).await;
    assert_eq!(backend.acquisitions.load(Ordering::SeqCst), calls, "no step after stop");
}

#[tokio::test]
#[traced_test]
async fn test_stop_releases_the_lease_of_a_leader() {
    let backend = shared_backend();
    let (master, mut events) = build_master("resigning", backend.clone());

    master.start().unwrap();
    assert_eq!(next_event(&mut events).await, ("start", 1));
    assert!(backend.read_current().await.unwrap().is_some());

    master.stop().await.unwrap();

    assert!(!master.is_master());
    assert!(master.current_master().await.unwrap().is_none());
    assert_eq!(next_event(&mut events).await, ("stop", 1));
}

#[tokio::test]
#[traced_test]
async fn test_stop_of_follower_leaves_foreign_lease_alone() {
    let backend = shared_backend();
    let mut foreign = LeaseRecord::new("incumbent", "it", "10.0.0.7");
    foreign.start_at(SystemTime::now() + Duration::from_secs(60));
    backend.put(foreign);

    let (master, mut events) = build_master("bystander", backend.clone());
    master.start().unwrap();
    sleep(HEARTBEAT * 2).await;
    master.stop().await.unwrap();

    let holder = backend.read_current().await.unwrap().unwrap();
    assert_eq!(holder.holder_id, "incumbent");
    assert!(events.try_recv().is_err());
}

#[tokio::test]
#[traced_test]
async fn test_restart_after_stop_starts_a_new_epoch() {
    let backend = shared_backend();
    let (master, mut events) = build_master("phoenix", backend.clone());

    master.start().unwrap();
    assert_eq!(next_event(&mut events).await, ("start", 1));
    master.stop().await.unwrap();
    assert_eq!(next_event(&mut events).await, ("stop", 1));

    master.start().unwrap();
    assert_eq!(next_event(&mut events).await, ("start", 2));
    master.stop().await.unwrap();
    assert_eq!(next_event(&mut events).await, ("stop", 2));
}
