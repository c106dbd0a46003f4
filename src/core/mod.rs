mod election;
mod role;
mod timer;

pub use election::*;
pub use role::*;
pub(crate) use timer::*;
