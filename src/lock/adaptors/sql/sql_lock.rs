use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::init_sql_lock_pool;
use super::MASTER_LOCK_TABLE;
use crate::lock::adaptors::may_acquire;
use crate::time::from_millis;
use crate::time::timestamp_millis;
use crate::LeaseError;
use crate::LeaseRecord;
use crate::LockBackend;
use crate::Result;
use crate::StalenessChecker;
use crate::StorageConfig;

type LeaseRow = (String, String, String, i64, i64, i64);

/// Lock backend keeping one lease row per election scope in a SQLite file.
///
/// Unlike sled, any number of processes can open the same `db_path`; SQLite
/// serializes their writes and every write is conditional on the row's
/// `generation`, so concurrent candidates in different processes still see
/// exactly one winner.
///
/// Releasing a lease keeps the row with an empty holder instead of deleting
/// it, which keeps `generation` strictly increasing across tenures.
/// Timestamps are persisted with millisecond precision.
#[derive(Clone)]
pub struct SqlLockBackend {
    pool: SqlitePool,
    scope: String,
    schema: Arc<OnceCell<()>>,
}

impl std::fmt::Debug for SqlLockBackend {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SqlLockBackend").field("scope", &self.scope).finish()
    }
}

impl SqlLockBackend {
    /// Opens the lock database under `config.db_path` and binds to
    /// `config.scope`. Connections are made on first use.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let pool = init_sql_lock_pool(&config.db_path)?;
        Ok(Self::with_pool(pool, &config.scope))
    }

    pub fn with_pool(
        pool: SqlitePool,
        scope: &str,
    ) -> Self {
        info!("lock scope `{}` bound to table {}", scope, MASTER_LOCK_TABLE);
        Self {
            pool,
            scope: scope.to_string(),
            schema: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     scope TEXT PRIMARY KEY, \
                     holder_id TEXT NOT NULL, \
                     version TEXT NOT NULL, \
                     holder_address TEXT NOT NULL, \
                     acquired_at_ms INTEGER NOT NULL, \
                     last_heartbeat_at_ms INTEGER NOT NULL, \
                     generation INTEGER NOT NULL)",
                    MASTER_LOCK_TABLE
                ))
                .execute(&self.pool)
                .await?;
                Ok::<(), crate::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Reads the scope's row, including a released one with an empty holder.
    async fn load(&self) -> Result<Option<LeaseRecord>> {
        self.ensure_schema().await?;
        let row: Option<LeaseRow> = sqlx::query_as(&format!(
            "SELECT holder_id, version, holder_address, acquired_at_ms, \
             last_heartbeat_at_ms, generation FROM {} WHERE scope = ?",
            MASTER_LOCK_TABLE
        ))
        .bind(&self.scope)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_record))
    }
}

fn into_record(
    (holder_id, version, holder_address, acquired_at_ms, last_heartbeat_at_ms, generation): LeaseRow
) -> LeaseRecord {
    LeaseRecord {
        holder_id,
        version,
        holder_address,
        acquired_at: from_millis(acquired_at_ms),
        last_heartbeat_at: from_millis(last_heartbeat_at_ms),
        generation: u64::try_from(generation).unwrap_or(0),
    }
}

fn millis(t: SystemTime) -> i64 {
    i64::try_from(timestamp_millis(t)).unwrap_or(i64::MAX)
}

#[async_trait]
impl LockBackend for SqlLockBackend {
    async fn try_acquire(
        &self,
        candidate: &LeaseRecord,
        now: SystemTime,
        checker: &StalenessChecker,
    ) -> Result<bool> {
        let observed = self.load().await?;
        let live = observed.as_ref().filter(|record| !record.holder_id.is_empty());
        if !may_acquire(live, candidate, now, checker) {
            trace!("lease held by a live holder: {:?}", live);
            return Ok(false);
        }

        let result = match observed {
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {} (scope, holder_id, version, holder_address, \
                     acquired_at_ms, last_heartbeat_at_ms, generation) \
                     VALUES (?, ?, ?, ?, ?, ?, 1) ON CONFLICT(scope) DO NOTHING",
                    MASTER_LOCK_TABLE
                ))
                .bind(&self.scope)
                .bind(&candidate.holder_id)
                .bind(&candidate.version)
                .bind(&candidate.holder_address)
                .bind(millis(now))
                .bind(millis(now))
                .execute(&self.pool)
                .await?
            }
            Some(record) => {
                let expected = i64::try_from(record.generation).unwrap_or(i64::MAX);
                sqlx::query(&format!(
                    "UPDATE {} SET holder_id = ?, version = ?, holder_address = ?, \
                     acquired_at_ms = ?, last_heartbeat_at_ms = ?, generation = generation + 1 \
                     WHERE scope = ? AND generation = ?",
                    MASTER_LOCK_TABLE
                ))
                .bind(&candidate.holder_id)
                .bind(&candidate.version)
                .bind(&candidate.holder_address)
                .bind(millis(now))
                .bind(millis(now))
                .bind(&self.scope)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
        };

        let acquired = result.rows_affected() == 1;
        debug!("{} try_acquire: {}", candidate.holder_id, acquired);
        Ok(acquired)
    }

    async fn release(
        &self,
        candidate_id: &str,
    ) -> Result<bool> {
        self.ensure_schema().await?;
        let result = sqlx::query(&format!(
            "UPDATE {} SET holder_id = '', version = '', holder_address = '', \
             acquired_at_ms = 0, last_heartbeat_at_ms = 0, generation = generation + 1 \
             WHERE scope = ? AND holder_id = ? AND holder_id <> ''",
            MASTER_LOCK_TABLE
        ))
        .bind(&self.scope)
        .bind(candidate_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn renew_heartbeat(
        &self,
        candidate_id: &str,
    ) -> Result<SystemTime> {
        self.ensure_schema().await?;
        let renewed: Option<(i64,)> = sqlx::query_as(&format!(
            "UPDATE {} SET last_heartbeat_at_ms = MAX(last_heartbeat_at_ms, ?), \
             generation = generation + 1 \
             WHERE scope = ? AND holder_id = ? AND holder_id <> '' \
             RETURNING last_heartbeat_at_ms",
            MASTER_LOCK_TABLE
        ))
        .bind(millis(SystemTime::now()))
        .bind(&self.scope)
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((last_heartbeat_at_ms,)) = renewed {
            return Ok(from_millis(last_heartbeat_at_ms));
        }

        match self.load().await? {
            Some(record) if !record.holder_id.is_empty() => Err(LeaseError::NotOwned {
                holder_id: record.holder_id,
            }
            .into()),
            _ => Err(LeaseError::NotFound.into()),
        }
    }

    async fn read_current(&self) -> Result<Option<LeaseRecord>> {
        Ok(self.load().await?.filter(|record| !record.holder_id.is_empty()))
    }
}
