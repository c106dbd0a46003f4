mod mem_lock;

pub use mem_lock::*;
