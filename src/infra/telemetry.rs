//! Log subscriber and metric descriptions for the vitrine process.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const COUNTERS: &[(&str, &str)] = &[
    (
        "vitrine_cache_l0_hit_total",
        "Listing lookups answered by a fresh cache entry.",
    ),
    (
        "vitrine_cache_l0_miss_total",
        "Listing lookups with no cache entry.",
    ),
    (
        "vitrine_cache_l0_stale_total",
        "Listing lookups that found an entry marked stale.",
    ),
    (
        "vitrine_cache_l0_evict_total",
        "Listing entries evicted due to capacity.",
    ),
    (
        "vitrine_cache_l1_hit_total",
        "Shell responses served from the response cache.",
    ),
    (
        "vitrine_cache_l1_miss_total",
        "Shell responses rendered because the response cache had none.",
    ),
    (
        "vitrine_resolve_failed_total",
        "Listing resolves that ended in the failed state.",
    ),
    ("vitrine_mutation_total", "Product writes by outcome."),
];

const LATENCIES: &[(&str, &str)] = &[
    ("vitrine_cache_consume_ms", "Time spent applying one event batch."),
    ("vitrine_cache_warm_ms", "Time spent refilling the default listing."),
];

/// Install the global log subscriber described by `logging`.
///
/// `RUST_LOG` directives override the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("failed to install log subscriber: {err}")))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for &(name, description) in COUNTERS {
            describe_counter!(name, Unit::Count, description);
        }
        for &(name, description) in LATENCIES {
            describe_histogram!(name, Unit::Milliseconds, description);
        }
        describe_gauge!(
            "vitrine_cache_event_queue_len",
            Unit::Count,
            "Cache events waiting for the consumer."
        );
    });
}
