//! Errors produced while driving the module lifecycle.

use crate::runtime::BoxError;
use thiserror::Error;

/// Failure of one module during a lifecycle phase.
#[derive(Debug, Error)]
#[error("{module}: {source}")]
pub struct ModuleFailure {
    /// Identity of the failing module.
    pub module: String,
    /// What went wrong.
    pub source: BoxError,
}

impl ModuleFailure {
    pub(crate) fn new(module: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            module: module.into(),
            source: source.into(),
        }
    }
}

/// Causes raised by the runtime itself rather than by a module hook.
#[derive(Debug, Error)]
pub enum Fault {
    /// The module did not finish shutting down before the deadline.
    #[error("shutdown deadline exceeded")]
    DeadlineExceeded,

    /// The hook panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// A value the module needs was not provided by an earlier module.
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),
}

impl Fault {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Fault::Panicked(message)
    }
}

/// Error returned by [`Runtime::run`](crate::runtime::Runtime::run).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A module failed to initialize. Nothing was started.
    #[error("module {module} failed to initialize: {source}")]
    Init {
        /// Identity of the failing module.
        module: String,
        /// The module's error.
        source: BoxError,
    },

    /// A module failed to start. Every module was then shut down.
    #[error("module {module} failed to start: {source}")]
    Start {
        /// Identity of the failing module.
        module: String,
        /// The module's error.
        source: BoxError,
        /// Failures collected during the shutdown that followed.
        shutdown: Vec<ModuleFailure>,
    },

    /// One or more modules failed to shut down.
    #[error("{} module(s) failed to shut down: {}", .0.len(), join_failures(.0))]
    Shutdown(Vec<ModuleFailure>),
}

impl RuntimeError {
    /// Identity of the module that caused an init or start failure.
    pub fn module(&self) -> Option<&str> {
        match self {
            RuntimeError::Init { module, .. } | RuntimeError::Start { module, .. } => Some(module),
            RuntimeError::Shutdown(_) => None,
        }
    }

    /// Shutdown failures carried by this error.
    pub fn shutdown_failures(&self) -> &[ModuleFailure] {
        match self {
            RuntimeError::Init { .. } => &[],
            RuntimeError::Start { shutdown, .. } => shutdown,
            RuntimeError::Shutdown(failures) => failures,
        }
    }
}

fn join_failures(failures: &[ModuleFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_names_module() {
        let err = RuntimeError::Init {
            module: "db[primary]".to_string(),
            source: "connection refused".into(),
        };
        assert_eq!(err.module(), Some("db[primary]"));
        assert_eq!(
            err.to_string(),
            "module db[primary] failed to initialize: connection refused"
        );
        assert!(err.shutdown_failures().is_empty());
    }

    #[test]
    fn test_shutdown_error_lists_failures() {
        let err = RuntimeError::Shutdown(vec![
            ModuleFailure::new("http", Fault::DeadlineExceeded),
            ModuleFailure::new("grpc", "socket closed"),
        ]);
        assert_eq!(err.shutdown_failures().len(), 2);
        assert_eq!(
            err.to_string(),
            "2 module(s) failed to shut down: http: shutdown deadline exceeded; grpc: socket closed"
        );
    }

    #[test]
    fn test_panic_payloads() {
        let fault = Fault::from_panic(Box::new("boom"));
        assert_eq!(fault.to_string(), "panicked: boom");

        let fault = Fault::from_panic(Box::new(String::from("bang")));
        assert_eq!(fault.to_string(), "panicked: bang");

        let fault = Fault::from_panic(Box::new(7_u8));
        assert_eq!(fault.to_string(), "panicked: unknown panic payload");
    }
}
