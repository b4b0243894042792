//! Reload and binding metrics, behind the `metrics` feature.
//!
//! ```rust,no_run
//! use bootkit::modules::ConfigModule;
//! use opentelemetry::global;
//!
//! let config = ConfigModule::new().with_metrics(global::meter("my-app"));
//! ```

mod reload_metrics;

pub use reload_metrics::ReloadMetrics;
