//! Per-run state handed to module hooks.

use crate::core::ConfigStore;
use crate::runtime::{BoxError, CancelToken, Fault};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Context passed to every [`Module::init`](crate::runtime::Module::init).
///
/// Holds a small registry keyed by type. A module provides a value during its
/// init and every later module can read it. Values are usually `Arc`s so they
/// can be cloned out and kept past init.
pub struct InitContext {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    cancel: CancelToken,
}

impl InitContext {
    pub(crate) fn new(cancel: CancelToken) -> Self {
        Self {
            values: HashMap::new(),
            cancel,
        }
    }

    /// Make `value` available to later modules, returning any value of the same
    /// type it replaces.
    pub fn provide<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// The value of type `T`, if an earlier module provided one.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Like [`get`](Self::get), failing with [`Fault::MissingDependency`].
    pub fn require<T: Any + Send + Sync>(&self) -> Result<&T, BoxError> {
        self.get::<T>()
            .ok_or_else(|| Fault::MissingDependency(type_name::<T>()).into())
    }

    /// The configuration store provided by the config module.
    pub fn config(&self) -> Result<Arc<ConfigStore>, BoxError> {
        self.require::<Arc<ConfigStore>>().cloned()
    }

    /// Token cancelled when the runtime begins shutting down.
    ///
    /// Background work spawned during init should stop when it fires.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for InitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitContext")
            .field("values", &self.values.len())
            .finish()
    }
}

/// Context passed to [`Module::shutdown`](crate::runtime::Module::shutdown).
#[derive(Debug, Clone, Copy)]
pub struct ShutdownContext {
    deadline: Instant,
}

impl ShutdownContext {
    pub(crate) fn new(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// Point in time after which the module is abandoned.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
