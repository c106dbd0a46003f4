//! Leveled logging collaborator of the election controller.
//!
//! Backends and the ticker log through `tracing` directly. The controller
//! reports role changes and swallowed step errors through a [`Logger`] so
//! that embedders can route them to their own sink.
mod logger;

pub use logger::*;
