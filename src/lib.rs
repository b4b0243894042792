//! # bootkit
//!
//! Application bootstrapping: a module lifecycle runtime paired with layered,
//! hot-reloading configuration.
//!
//! ## Overview
//!
//! `bootkit` wires independently lifecycled subsystems into one process:
//! - An ordered list of [`runtime::Module`]s driven through init, start and
//!   shutdown by a [`runtime::Runtime`]
//! - A configuration tree merged from files, environment variables and
//!   command-line flags (files → env vars → flags)
//! - Debounced reloads when configuration files change
//! - Typed [`core::Binding`]s with lock-free reads that keep their last good
//!   value when a reload does not validate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bootkit::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Limits {
//!     max_connections: u32,
//! }
//!
//! impl Validate for Limits {
//!     fn validate(&self) -> std::result::Result<(), ValidationError> {
//!         if self.max_connections == 0 {
//!             return Err(ValidationError::invalid_field("max_connections", "must be positive"));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), RuntimeError> {
//!     Runtime::new()
//!         .with_module(ConfigModule::new().with_args(std::env::args().skip(1)))
//!         .with_module(LoggingModule::new())
//!         .with_module(BindModule::<Limits>::new("app.limits"))
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload when configuration files change
//! - `metrics`: OpenTelemetry metrics for reloads and rejected values

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod modules;
pub mod notify;
pub mod runtime;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Binding, ConfigStore, Tree, Validate, module_path};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::modules::{BindModule, ConfigModule, LoggingModule};
    pub use crate::runtime::{
        BoxError, CancelToken, InitContext, Module, Runtime, RuntimeError, ShutdownContext,
        StartMode,
    };
}
