//! Prometheus instrumentation of the election engine.
//!
//! Every series is labelled with the candidate id so several controllers in
//! one process stay distinguishable.
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    pub static ref ELECTIONS_WON: IntCounterVec = IntCounterVec::new(
        Opts::new("elections_won", "Follower to leader transitions"),
        &["id"]
    )
    .expect("Should succeed to create metric");

    pub static ref LEASES_LOST: IntCounterVec = IntCounterVec::new(
        Opts::new("leases_lost", "Leader demotions caused by a failed heartbeat renewal"),
        &["id"]
    )
    .expect("Should succeed to create metric");

    pub static ref BACKEND_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("lock_backend_errors", "Lock backend failures by operation"),
        &["id", "op"]
    )
    .expect("Should succeed to create metric");

    pub static ref IS_MASTER: IntGaugeVec = IntGaugeVec::new(
        Opts::new("is_master", "1 while the candidate holds the lease"),
        &["id"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(ELECTIONS_WON.clone()),
        Box::new(LEASES_LOST.clone()),
        Box::new(BACKEND_ERRORS.clone()),
        Box::new(IS_MASTER.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Registers the election metrics with [`REGISTRY`] once per process.
pub fn init_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Renders [`REGISTRY`] in the Prometheus text exposition format.
pub fn encode_metrics() -> String {
    init_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
