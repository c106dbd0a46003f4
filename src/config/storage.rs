use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Lock store the builder opens when no backend is supplied.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    /// SQLite file shared by any number of candidate processes
    #[default]
    Sqlite,
    /// sled database owned by a single process
    Sled,
}

/// Settings of the default persistent lock store.
///
/// With the `sqlite` engine, candidate processes electing one master point
/// at the same `db_path` and `scope`. A `sled` database can only be opened
/// by one process at a time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Election scope: name of the single lease record contended for
    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default)]
    pub engine: StorageEngine,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scope: default_scope(),
            engine: StorageEngine::default(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "db_path cannot be empty".into(),
            )));
        }

        if self.scope.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "election scope cannot be empty".into(),
            )));
        }

        Ok(())
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/tmp/d-master/db")
}

fn default_scope() -> String {
    "master".to_string()
}
