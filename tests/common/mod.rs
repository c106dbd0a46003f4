use std::sync::Arc;
use std::time::Duration;

use d_master::LockBackend;
use d_master::Master;
use d_master::MasterBuilder;
use d_master::MasterConfig;
use d_master::MemLockBackend;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;

pub const HEARTBEAT: Duration = Duration::from_millis(50);
pub const MULTIPLIER: u32 = 3;

/// Hook notifications as `(hook, epoch)` pairs.
pub type HookEvents = mpsc::UnboundedReceiver<(&'static str, u64)>;

pub fn shared_backend() -> Arc<MemLockBackend> {
    Arc::new(MemLockBackend::new())
}

/// Builder with the test timing and hooks reporting into the returned
/// receiver; no backend chosen yet.
pub fn hooked_builder(
    id: &str,
    config: MasterConfig,
) -> (MasterBuilder, HookEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stop_tx = tx.clone();

    let builder = MasterBuilder::init(config)
        .id(id)
        .address("127.0.0.1")
        .version("it")
        .heartbeat(HEARTBEAT)
        .heartbeat_multiplier(MULTIPLIER)
        .on_master_start(move |epoch| {
            let _ = tx.send(("start", epoch));
        })
        .on_master_stop(move |epoch| {
            let _ = stop_tx.send(("stop", epoch));
        });

    (builder, rx)
}

pub fn build_master(
    id: &str,
    backend: Arc<dyn LockBackend>,
) -> (Master, HookEvents) {
    let (builder, rx) = hooked_builder(id, MasterConfig::default());
    let master = builder.backend(backend).build().expect("build master");
    (master, rx)
}

pub async fn next_event(events: &mut HookEvents) -> (&'static str, u64) {
    timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("hook should fire in time")
        .expect("hook channel open")
}

/// Polls `condition` until it holds or `within` elapses.
pub async fn wait_until<F>(
    within: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn masters_count(masters: &[Master]) -> usize {
    masters.iter().filter(|m| m.is_master()).count()
}
