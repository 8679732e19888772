// Telemetry setup.
// Tracing subscriber on stderr and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::{GroveError, Result};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<()> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| GroveError::Other(format!("failed to install tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "grove_cache_hit_total",
            Unit::Count,
            "Requests answered from a usable cached record."
        );
        describe_counter!(
            "grove_cache_miss_total",
            Unit::Count,
            "Requests with no usable cached record."
        );
        describe_counter!(
            "grove_cache_evict_total",
            Unit::Count,
            "Entries evicted to keep a namespace within its limit."
        );
        describe_counter!(
            "grove_cache_superseded_total",
            Unit::Count,
            "Fetch results discarded because a newer request was made."
        );
    });
}
