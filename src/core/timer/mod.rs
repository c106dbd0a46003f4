mod heartbeat_ticker;

pub(crate) use heartbeat_ticker::*;
