use serde::Deserialize;
use serde::Serialize;

use crate::LogLevel;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Minimum level forwarded to the election logger: `debug`, `info` or
    /// `error`
    #[serde(default)]
    pub level: LogLevel,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
