pub mod id;

pub mod net;

pub mod time;
