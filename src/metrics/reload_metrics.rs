//! OpenTelemetry instruments recorded by [`ConfigStore`](crate::core::ConfigStore).

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

const PREFIX: &str = "bootkit.config";

/// How a reload ended.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// The new tree replaced the old one.
    Applied,
    /// A source failed and the old tree stayed.
    Kept,
}

impl Outcome {
    fn attributes(self) -> [KeyValue; 1] {
        let label = match self {
            Outcome::Applied => "applied",
            Outcome::Kept => "kept",
        };
        [KeyValue::new("outcome", label)]
    }
}

/// Reload instruments shared by a store and its bindings.
///
/// Clones record into the same instruments and share the time of the last
/// applied tree. Attach one with
/// [`ConfigModule::with_metrics`](crate::modules::ConfigModule::with_metrics)
/// or [`ConfigStore::with_metrics`](crate::core::ConfigStore::with_metrics).
///
/// Instruments, all prefixed `bootkit.config.`:
///
/// | name | kind | attributes |
/// |------|------|------------|
/// | `reloads.started` | counter | |
/// | `reloads` | counter | `outcome` = `applied` or `kept` |
/// | `reload.seconds` | histogram | `outcome` |
/// | `callbacks` | gauge | |
/// | `tree.age.seconds` | gauge | |
/// | `binding.rejections` | counter | `path` |
#[derive(Clone)]
pub struct ReloadMetrics {
    started: Counter<u64>,
    finished: Counter<u64>,
    latency: Histogram<f64>,
    callbacks: Gauge<i64>,
    tree_age: Gauge<i64>,
    rejections: Counter<u64>,
    applied_at: Arc<Mutex<Instant>>,
}

impl ReloadMetrics {
    /// Register the instruments on `meter`.
    pub fn new(meter: Meter) -> Self {
        let counter = |name: &str, help: &'static str| {
            meter
                .u64_counter(format!("{PREFIX}.{name}"))
                .with_description(help)
                .build()
        };
        let gauge = |name: &str, help: &'static str| {
            meter
                .i64_gauge(format!("{PREFIX}.{name}"))
                .with_description(help)
                .build()
        };

        Self {
            started: counter("reloads.started", "Reloads begun"),
            finished: counter("reloads", "Reloads finished, by outcome"),
            latency: meter
                .f64_histogram(format!("{PREFIX}.reload.seconds"))
                .with_description("Time spent assembling a tree")
                .with_unit("s")
                .build(),
            callbacks: gauge("callbacks", "Reload callbacks registered on the store"),
            tree_age: gauge("tree.age.seconds", "Seconds since a reload last applied a tree"),
            rejections: counter(
                "binding.rejections",
                "Reloaded values a binding refused to decode or validate",
            ),
            applied_at: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Count a reload and return its start time.
    pub fn start_reload(&self) -> Instant {
        self.started.add(1, &[]);
        Instant::now()
    }

    /// Record a reload, started at `start`, that swapped in a new tree.
    pub fn record_reload_success(&self, start: Instant) {
        self.finish(start, Outcome::Applied);
        *self.applied_at.lock() = Instant::now();
    }

    /// Record a reload, started at `start`, that kept the current tree.
    pub fn record_reload_failure(&self, start: Instant) {
        self.finish(start, Outcome::Kept);
    }

    fn finish(&self, start: Instant, outcome: Outcome) {
        let attributes = outcome.attributes();
        self.finished.add(1, &attributes);
        self.latency.record(start.elapsed().as_secs_f64(), &attributes);
    }

    /// Count a binding at `path` holding on to its last good value.
    pub fn record_binding_rejection(&self, path: &str) {
        self.rejections
            .add(1, &[KeyValue::new("path", path.to_string())]);
    }

    pub fn update_callback_count(&self, count: i64) {
        self.callbacks.record(count, &[]);
    }

    /// Publish how long ago a reload last applied a tree.
    pub fn update_tree_age(&self) {
        let age = self.applied_at.lock().elapsed().as_secs();
        self.tree_age.record(i64::try_from(age).unwrap_or(i64::MAX), &[]);
    }
}
