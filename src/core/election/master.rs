use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;

use crate::metrics::BACKEND_ERRORS;
use crate::metrics::ELECTIONS_WON;
use crate::metrics::IS_MASTER;
use crate::metrics::LEASES_LOST;
use crate::AtomicFlag;
use crate::Error;
use crate::HeartbeatTicker;
use crate::LeaseRecord;
use crate::LifecycleError;
use crate::LockBackend;
use crate::Logger;
use crate::Result;
use crate::Role;
use crate::StalenessChecker;

/// Callback fired on a role transition with the epoch it belongs to.
pub type MasterHook = Arc<dyn Fn(u64) + Send + Sync + 'static>;

/// User callbacks run when this candidate gains or loses the lease.
///
/// Hooks run detached on the blocking pool, or on a dedicated thread when the
/// transition happens outside a tokio runtime. The election loop never waits
/// on them, and a panicking hook only takes down its own task.
#[derive(Clone, Default)]
pub struct MasterHooks {
    pub on_master_start: Option<MasterHook>,
    pub on_master_stop: Option<MasterHook>,
}

impl fmt::Debug for MasterHooks {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MasterHooks")
            .field("on_master_start", &self.on_master_start.is_some())
            .field("on_master_stop", &self.on_master_stop.is_some())
            .finish()
    }
}

/// Single-master election controller.
///
/// Every heartbeat a follower tries to acquire the lease and a leader renews
/// it. A failed renewal is the only way a running leader steps down.
///
/// Cloning yields another handle to the same controller. Dropping the last
/// handle of a running controller cancels its loop after the step in flight;
/// the lease is not released then and expires once its TTL passes, so call
/// [`Master::stop`] for a prompt handover.
#[derive(Clone)]
pub struct Master {
    inner: Arc<MasterInner>,
    _lifetime: Arc<DropGuard>,
}

struct MasterInner {
    id: String,
    /// Local view of our own claim; timestamps are zero while following.
    lease: Mutex<LeaseRecord>,
    is_master: AtomicFlag,
    is_started: AtomicFlag,
    epoch: AtomicU64,
    /// Heartbeat cadence and the staleness rule handed to the backend
    checker: StalenessChecker,
    hooks: MasterHooks,
    backend: Arc<dyn LockBackend>,
    logger: Arc<dyn Logger>,
    /// Guards the started flag together with the running loop.
    ticker: Mutex<Option<HeartbeatTicker>>,
    /// Parent of every loop's shutdown token, cancelled with the last handle
    lifetime: CancellationToken,
}

impl fmt::Debug for Master {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Master")
            .field("id", &self.inner.id)
            .field("is_master", &self.inner.is_master.get())
            .field("is_started", &self.inner.is_started.get())
            .field("epoch", &self.epoch())
            .field("checker", &self.inner.checker)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}

impl Master {
    /// Creates a stopped controller competing with `candidate` as its lease
    /// template. It steps every `checker.interval()` and judges other
    /// holders' leases with `checker`. Prefer [`crate::MasterBuilder`].
    pub fn new(
        candidate: LeaseRecord,
        checker: StalenessChecker,
        backend: Arc<dyn LockBackend>,
        hooks: MasterHooks,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let mut lease = candidate;
        lease.clear();
        let lifetime = CancellationToken::new();

        Self {
            _lifetime: Arc::new(lifetime.clone().drop_guard()),
            inner: Arc::new(MasterInner {
                id: lease.holder_id.clone(),
                lease: Mutex::new(lease),
                is_master: AtomicFlag::new(false),
                is_started: AtomicFlag::new(false),
                epoch: AtomicU64::new(0),
                checker,
                hooks,
                backend,
                logger,
                ticker: Mutex::new(None),
                lifetime,
            }),
        }
    }

    /// Begins campaigning. The first election step runs right away on the
    /// ambient tokio runtime; this call does not wait for it.
    ///
    /// # Errors
    /// [`LifecycleError::AlreadyStarted`] if the controller is running.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.inner.ticker.lock();
        if !self.inner.is_started.set_with_cond(false, true) {
            return Err(LifecycleError::AlreadyStarted.into());
        }

        let inner = self.inner.clone();
        let shutdown = self.inner.lifetime.child_token();
        let ticker = HeartbeatTicker::spawn(self.inner.checker.interval(), shutdown, move || {
            let inner = inner.clone();
            async move { inner.step().await }
        });
        match ticker {
            Ok(ticker) => *slot = Some(ticker),
            Err(e) => {
                self.inner.is_started.set_false();
                return Err(e);
            }
        }

        self.inner
            .logger
            .info(&format!("master candidate {} started", self.inner.id));
        Ok(())
    }

    /// Stops campaigning.
    ///
    /// Waits for an in-flight step to finish, then releases the lease if this
    /// candidate holds it. Local state is demoted even when the release
    /// fails; the release error is returned afterwards.
    ///
    /// # Errors
    /// [`LifecycleError::NotStarted`] if the controller is not running.
    pub async fn stop(&self) -> Result<()> {
        let ticker = {
            let mut slot = self.inner.ticker.lock();
            if !self.inner.is_started.set_with_cond(true, false) {
                return Err(LifecycleError::NotStarted.into());
            }
            slot.take()
        };

        let was_master = self.inner.is_master.get();
        let quiesced = match ticker {
            Some(ticker) => ticker.stop().await,
            None => Ok(()),
        };
        if let Err(e) = &quiesced {
            self.inner
                .logger
                .error(&format!("heartbeat loop of {} ended abnormally: {}", self.inner.id, e));
        }

        let resigned = self.inner.resign(was_master).await;
        self.inner
            .logger
            .info(&format!("master candidate {} stopped", self.inner.id));

        quiesced.and(resigned)
    }

    /// Lock-free read of the role flag.
    pub fn is_master(&self) -> bool {
        self.inner.is_master.get()
    }

    pub fn role(&self) -> Role {
        Role::from(self.is_master())
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Number of leaderships won by this controller so far.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_started.get()
    }

    /// Snapshot of the local lease view.
    pub fn lease(&self) -> LeaseRecord {
        self.inner.lease.lock().clone()
    }

    /// Reads the current holder of the scope from the backend.
    ///
    /// `Ok(None)` means nobody holds the lease.
    pub async fn current_master(&self) -> Result<Option<LeaseRecord>> {
        self.inner.backend.read_current().await
    }
}

impl MasterInner {
    async fn step(&self) {
        if self.is_master.get() {
            self.renew().await;
        } else {
            self.campaign().await;
        }
    }

    async fn campaign(&self) {
        let candidate = self.lease.lock().clone();
        let now = SystemTime::now();

        match self.backend.try_acquire(&candidate, now, &self.checker).await {
            Ok(true) => {
                if !self.is_master.set_with_cond(false, true) {
                    return;
                }
                self.lease.lock().start_at(now);
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

                ELECTIONS_WON.with_label_values(&[self.id.as_str()]).inc();
                IS_MASTER.with_label_values(&[self.id.as_str()]).set(1);
                self.logger
                    .info(&format!("{} became master at epoch {}", self.id, epoch));
                self.fire(self.hooks.on_master_start.clone(), epoch);
            }
            Ok(false) => {
                self.logger
                    .debug(&format!("{} lost the election: lease is held", self.id));
            }
            Err(e) => {
                BACKEND_ERRORS.with_label_values(&[self.id.as_str(), "try_acquire"]).inc();
                self.logger
                    .error(&format!("{} try_acquire failed: {}", self.id, e));
            }
        }
    }

    async fn renew(&self) {
        match self.backend.renew_heartbeat(&self.id).await {
            Ok(heartbeat) => {
                self.lease.lock().set_last_heartbeat(heartbeat);
                self.logger.debug(&format!("{} renewed its lease", self.id));
            }
            Err(e) => self.step_down(&e),
        }
    }

    fn step_down(
        &self,
        cause: &Error,
    ) {
        if !self.is_master.set_with_cond(true, false) {
            return;
        }
        self.lease.lock().clear();
        let epoch = self.epoch.load(Ordering::SeqCst);

        LEASES_LOST.with_label_values(&[self.id.as_str()]).inc();
        IS_MASTER.with_label_values(&[self.id.as_str()]).set(0);
        if cause.is_lease_lost() {
            self.logger
                .info(&format!("{} lost the lease at epoch {}: {}", self.id, epoch, cause));
        } else {
            BACKEND_ERRORS
                .with_label_values(&[self.id.as_str(), "renew_heartbeat"])
                .inc();
            self.logger.error(&format!(
                "{} stepped down at epoch {} after renew failed: {}",
                self.id, epoch, cause
            ));
        }
        self.fire(self.hooks.on_master_stop.clone(), epoch);
    }

    /// Demotes after the loop has quiesced and gives the lease back.
    ///
    /// `was_master` is the role observed when stopping began; a step still
    /// in flight at that point may have changed it either way.
    async fn resign(
        &self,
        was_master: bool,
    ) -> Result<()> {
        let demoted = self.is_master.set_with_cond(true, false);
        if demoted {
            self.lease.lock().clear();
            IS_MASTER.with_label_values(&[self.id.as_str()]).set(0);
            let epoch = self.epoch.load(Ordering::SeqCst);
            self.logger
                .info(&format!("{} resigned at epoch {}", self.id, epoch));
            self.fire(self.hooks.on_master_stop.clone(), epoch);
        }

        if !(demoted || was_master) {
            return Ok(());
        }

        match self.backend.release(&self.id).await {
            Ok(released) => {
                self.logger
                    .debug(&format!("{} released lease: {}", self.id, released));
                Ok(())
            }
            Err(e) => {
                BACKEND_ERRORS.with_label_values(&[self.id.as_str(), "release"]).inc();
                self.logger
                    .error(&format!("{} failed to release lease: {}", self.id, e));
                Err(e)
            }
        }
    }

    fn fire(
        &self,
        hook: Option<MasterHook>,
        epoch: u64,
    ) {
        let Some(hook) = hook else {
            return;
        };

        match Handle::try_current() {
            Ok(runtime) => drop(runtime.spawn_blocking(move || hook(epoch))),
            Err(_) => {
                // e.g. stop() driven by a foreign executor
                let spawned = std::thread::Builder::new()
                    .name("master-hook".to_string())
                    .spawn(move || hook(epoch));
                if let Err(e) = spawned {
                    self.logger.error(&format!(
                        "{} could not run hook of epoch {}: {}",
                        self.id, epoch, e
                    ));
                }
            }
        }
    }
}
