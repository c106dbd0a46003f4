use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// Sink receiving the controller's diagnostics.
pub trait Logger: Send + Sync + 'static {
    fn debug(
        &self,
        msg: &str,
    );

    fn info(
        &self,
        msg: &str,
    );

    fn error(
        &self,
        msg: &str,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Forwards to `tracing`; whatever subscriber the host installed is the
/// console sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(
        &self,
        msg: &str,
    ) {
        tracing::debug!(target: "d_master::election", "{}", msg);
    }

    fn info(
        &self,
        msg: &str,
    ) {
        tracing::info!(target: "d_master::election", "{}", msg);
    }

    fn error(
        &self,
        msg: &str,
    ) {
        tracing::error!(target: "d_master::election", "{}", msg);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(
        &self,
        _msg: &str,
    ) {
    }

    fn info(
        &self,
        _msg: &str,
    ) {
    }

    fn error(
        &self,
        _msg: &str,
    ) {
    }
}

/// Drops messages below `level` before they reach `sink`.
#[derive(Clone)]
pub struct LeveledLogger {
    level: LogLevel,
    sink: Arc<dyn Logger>,
}

impl fmt::Debug for LeveledLogger {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LeveledLogger")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl LeveledLogger {
    pub fn new(
        level: LogLevel,
        sink: Arc<dyn Logger>,
    ) -> Self {
        Self { level, sink }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(
        &self,
        level: LogLevel,
    ) -> bool {
        level >= self.level
    }
}

impl Logger for LeveledLogger {
    fn debug(
        &self,
        msg: &str,
    ) {
        if self.enabled(LogLevel::Debug) {
            self.sink.debug(msg);
        }
    }

    fn info(
        &self,
        msg: &str,
    ) {
        if self.enabled(LogLevel::Info) {
            self.sink.info(msg);
        }
    }

    fn error(
        &self,
        msg: &str,
    ) {
        if self.enabled(LogLevel::Error) {
            self.sink.error(msg);
        }
    }
}
