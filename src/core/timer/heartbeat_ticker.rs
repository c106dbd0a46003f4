use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Error;
use crate::Result;

/// Runs a step function on a fixed interval until stopped.
///
/// The first step fires immediately. Steps execute one after another on a
/// single task, so they never overlap; ticks that elapse while a step is
/// still running are skipped rather than queued.
#[derive(Debug)]
pub(crate) struct HeartbeatTicker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl HeartbeatTicker {
    /// Spawns the loop on the ambient tokio runtime. The loop also ends when
    /// `shutdown` is cancelled from elsewhere, e.g. through a parent token.
    pub(crate) fn spawn<F, Fut>(
        interval: Duration,
        shutdown: CancellationToken,
        mut step: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Fatal(format!("heartbeat ticker needs a tokio runtime: {e}")))?;

        let token = shutdown.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("heartbeat ticker cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        step().await;
                    }
                }
            }
        });

        Ok(Self { shutdown, handle })
    }

    /// Halts future ticks and waits for the step in flight, if any.
    pub(crate) async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.handle.await?;
        Ok(())
    }
}
