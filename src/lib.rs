//! Lease-based single-master election.
//!
//! Candidates compete for one lease record kept by a pluggable
//! [`LockBackend`]. The holder renews a heartbeat on every tick; once it
//! misses `heartbeat_multiplier` heartbeats any other candidate may take the
//! lease over. A [`Master`] runs that loop and reports role changes through
//! start/stop hooks.
//!
//! ```ignore
//! let master = MasterBuilder::new()?
//!     .on_master_start(|epoch| tracing::info!("leading, epoch {}", epoch))
//!     .build()?;
//! master.start()?;
//! // ...
//! master.stop().await?;
//! ```
mod config;
mod core;
mod errors;
mod lock;
mod log;
pub mod metrics;
mod node;
pub mod utils;

pub use config::*;
pub use core::*;
pub use errors::*;
pub use lock::*;
pub use log::*;
pub use node::*;
pub use utils::*;
