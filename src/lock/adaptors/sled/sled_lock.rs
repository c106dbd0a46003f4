use std::sync::Arc;
use std::time::SystemTime;

use ::sled::IVec;
use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::init_sled_lock_db;
use super::MASTER_LOCK_NAMESPACE;
use crate::lock::adaptors::may_acquire;
use crate::BackendError;
use crate::LeaseError;
use crate::LeaseRecord;
use crate::LockBackend;
use crate::Result;
use crate::StalenessChecker;
use crate::StorageConfig;
use crate::MAX_CAS_RETRIES;

/// Persistent lock backend keeping one lease record per election scope in a
/// sled tree.
///
/// The record is stored bincode-encoded under the scope name. Writes go
/// through sled's `compare_and_swap` against the exact bytes previously read,
/// which include the record's `generation`.
///
/// sled holds an exclusive lock on its directory, so only one process can
/// open a given `db_path`. Controllers of that process share one instance
/// (it is cheap to clone); candidates in separate processes need
/// [`crate::SqlLockBackend`].
#[derive(Clone)]
pub struct SledLockBackend {
    db: Arc<::sled::Db>,
    tree: Arc<::sled::Tree>,
    key: IVec,
}

impl std::fmt::Debug for SledLockBackend {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledLockBackend")
            .field("scope", &String::from_utf8_lossy(&self.key))
            .finish()
    }
}

impl SledLockBackend {
    /// Opens (creating if needed) the lock database under
    /// `config.db_path` and binds to `config.scope`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let db = init_sled_lock_db(&config.db_path)?;
        Self::with_db(db, &config.scope)
    }

    pub fn with_db(
        db: ::sled::Db,
        scope: &str,
    ) -> Result<Self> {
        let tree = db.open_tree(MASTER_LOCK_NAMESPACE)?;
        info!("lock scope `{}` bound to tree {}", scope, MASTER_LOCK_NAMESPACE);
        Ok(Self {
            db: Arc::new(db),
            tree: Arc::new(tree),
            key: IVec::from(scope.as_bytes()),
        })
    }

    /// Reads the raw bytes and decoded record of the scope.
    fn load(&self) -> Result<Option<(IVec, LeaseRecord)>> {
        match self.tree.get(&self.key)? {
            Some(raw) => {
                let record = bincode::deserialize::<LeaseRecord>(&raw).map_err(|e| {
                    error!("corrupted lease record under {:?}: {}", self.key, e);
                    e
                })?;
                Ok(Some((raw, record)))
            }
            None => Ok(None),
        }
    }

    fn next_generation(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    /// Replaces `expected` with `new`; `Ok(false)` when the stored bytes no
    /// longer match what was read.
    async fn compare_and_swap(
        &self,
        expected: Option<&IVec>,
        new: Option<&LeaseRecord>,
    ) -> Result<bool> {
        let encoded = new.map(bincode::serialize).transpose()?;
        match self.tree.compare_and_swap(&self.key, expected, encoded)? {
            Ok(()) => {
                self.tree.flush_async().await?;
                Ok(true)
            }
            Err(conflict) => {
                trace!("conditional write lost: {:?}", conflict.current.is_some());
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl LockBackend for SledLockBackend {
    async fn try_acquire(
        &self,
        candidate: &LeaseRecord,
        now: SystemTime,
        checker: &StalenessChecker,
    ) -> Result<bool> {
        let observed = self.load()?;
        let (raw, current) = match observed {
            Some((raw, record)) => (Some(raw), Some(record)),
            None => (None, None),
        };
        if !may_acquire(current.as_ref(), candidate, now, checker) {
            trace!("lease held by a live holder: {:?}", current);
            return Ok(false);
        }

        let claimed = LeaseRecord::claimed_by(candidate, now, self.next_generation()?);
        let acquired = self.compare_and_swap(raw.as_ref(), Some(&claimed)).await?;
        debug!("{} try_acquire: {}", candidate.holder_id, acquired);
        Ok(acquired)
    }

    async fn release(
        &self,
        candidate_id: &str,
    ) -> Result<bool> {
        for _ in 0..MAX_CAS_RETRIES {
            let raw = match self.load()? {
                Some((raw, record)) if record.is_held_by(candidate_id) => raw,
                _ => return Ok(false),
            };
            if self.compare_and_swap(Some(&raw), None).await? {
                return Ok(true);
            }
        }

        warn!("release of {} kept conflicting", candidate_id);
        Err(BackendError::Conflict {
            retries: MAX_CAS_RETRIES,
        }
        .into())
    }

    async fn renew_heartbeat(
        &self,
        candidate_id: &str,
    ) -> Result<SystemTime> {
        for _ in 0..MAX_CAS_RETRIES {
            let (raw, mut record) = self.load()?.ok_or(LeaseError::NotFound)?;
            if !record.is_held_by(candidate_id) {
                return Err(LeaseError::NotOwned {
                    holder_id: record.holder_id,
                }
                .into());
            }

            record.set_last_heartbeat(SystemTime::now());
            record.generation = self.next_generation()?;
            if self.compare_and_swap(Some(&raw), Some(&record)).await? {
                return Ok(record.last_heartbeat_at);
            }
        }

        warn!("heartbeat of {} kept conflicting", candidate_id);
        Err(BackendError::Conflict {
            retries: MAX_CAS_RETRIES,
        }
        .into())
    }

    async fn read_current(&self) -> Result<Option<LeaseRecord>> {
        Ok(self.load()?.map(|(_, record)| record))
    }
}
