//! Module lifecycle runtime.
//!
//! A [`Runtime`] owns an ordered list of [`Module`]s and drives them through
//! three phases: init (sequential, fail-fast), start (concurrent,
//! cancel-on-first-error) and shutdown (concurrent, one deadline, failures
//! aggregated).

mod cancel;
mod context;
mod error;
mod module;
mod records;
#[allow(clippy::module_inception)]
mod runtime;

pub use cancel::{CancelScope, CancelToken};
pub use context::{InitContext, ShutdownContext};
pub use error::{Fault, ModuleFailure, RuntimeError};
pub use module::{BoxError, Module, StartMode};
pub use records::{ModuleRecord, ModuleRecords, Phase};
pub use runtime::{DEFAULT_SHUTDOWN_TIMEOUT, Runtime, shutdown_signal};
