use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref ACTIVE_WATCHERS: IntGauge = IntGauge::with_opts(Opts::new(
        "active_watchers",
        "Number of files currently watched"
    ))
    .expect("metric can not be created");

    pub static ref ACTIVE_SUBSCRIBERS: IntGauge = IntGauge::with_opts(Opts::new(
        "active_subscribers",
        "Number of subscribers attached to a watcher"
    ))
    .expect("metric can not be created");

    pub static ref LINES_BROADCAST: IntCounter = IntCounter::with_opts(Opts::new(
        "lines_broadcast_total",
        "Lines discovered by watchers and fanned out to subscribers"
    ))
    .expect("metric can not be created");

    pub static ref REPLAYED_LINES: IntCounter = IntCounter::with_opts(Opts::new(
        "replayed_lines_total",
        "Lines delivered through offset replay"
    ))
    .expect("metric can not be created");

    pub static ref READ_ERRORS: IntCounter = IntCounter::with_opts(Opts::new(
        "read_errors_total",
        "Failed detection cycles inside running watchers"
    ))
    .expect("metric can not be created");

    pub static ref EVICTED_SUBSCRIBERS: IntCounter = IntCounter::with_opts(Opts::new(
        "evicted_subscribers_total",
        "Subscribers dropped because their queue overflowed or closed"
    ))
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("logfetcher".to_string()), None).expect("registry can be created");
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(ACTIVE_WATCHERS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_SUBSCRIBERS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(LINES_BROADCAST.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REPLAYED_LINES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(READ_ERRORS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EVICTED_SUBSCRIBERS.clone()))
        .expect("collector can be registered");
}

/// Renders the crate metrics in the Prometheus text exposition format.
///
/// Serving them is left to the host process.
pub fn gather_metrics() -> String {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
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
