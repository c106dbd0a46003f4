mod sql_lock;

pub use sql_lock::*;


use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::Result;

/// Table holding one lease row per election scope
const MASTER_LOCK_TABLE: &str = "master_lock";

/// File name of the lock database inside `db_path`
const MASTER_LOCK_FILE: &str = "master_lock.sqlite";

/// How long a writer waits on another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a lazily connecting pool on the lock database under
/// `sql_db_root_path`, creating the directory if needed.
///
/// No idle or lifetime reaping is configured, so building the pool spawns
/// no background task and works outside a tokio runtime.
#[doc(hidden)]
pub fn init_sql_lock_pool(
    sql_db_root_path: impl AsRef<std::path::Path> + std::fmt::Debug
) -> Result<SqlitePool> {
    tracing::debug!("init_sql_lock_pool from path: {:?}", &sql_db_root_path);

    let path = sql_db_root_path.as_ref();
    std::fs::create_dir_all(path).map_err(|e| {
        tracing::warn!("Try to create lock directory {:?} and failed: {:?}", path, e);
        crate::BackendError::Storage(e.to_string())
    })?;

    let options = SqliteConnectOptions::new()
        .filename(path.join(MASTER_LOCK_FILE))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    Ok(SqlitePoolOptions::new()
        .max_connections(4)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_lazy_with(options))
}
