//! Per-module lifecycle bookkeeping.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of one module.
///
/// Phases only move forward in declaration order. `Failed` is terminal and can
/// be entered from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Registered, `init` not yet run.
    Created,
    /// `init` returned successfully.
    Initialized,
    /// The module's start hook is running or has reported readiness.
    Started,
    /// `shutdown` is running.
    ShuttingDown,
    /// `shutdown` returned successfully.
    Stopped,
    /// A hook failed or missed its deadline.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Created => "created",
            Phase::Initialized => "initialized",
            Phase::Started => "started",
            Phase::ShuttingDown => "shutting-down",
            Phase::Stopped => "stopped",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of one module's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// `kind` or `kind[name]`.
    pub identity: String,
    /// Current phase.
    pub phase: Phase,
    /// Instance name, if the module has one.
    pub instance_name: Option<String>,
    /// Dotted path of the module's configuration, if it has one.
    pub config_path: Option<String>,
}

/// Shared, live view of every module's record.
///
/// Cloning is cheap; all clones observe the same records.
#[derive(Debug, Clone, Default)]
pub struct ModuleRecords {
    inner: Arc<RwLock<Vec<ModuleRecord>>>,
}

impl ModuleRecords {
    /// Copy of all records in declaration order.
    pub fn snapshot(&self) -> Vec<ModuleRecord> {
        self.inner.read().clone()
    }

    /// Phase of the module at `index`.
    pub fn phase(&self, index: usize) -> Option<Phase> {
        self.inner.read().get(index).map(|r| r.phase)
    }

    /// Phases of every module in declaration order.
    pub fn phases(&self) -> Vec<Phase> {
        self.inner.read().iter().map(|r| r.phase).collect()
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, record: ModuleRecord) {
        self.inner.write().push(record);
    }

    pub(crate) fn update(&self, index: usize, f: impl FnOnce(&mut ModuleRecord)) {
        if let Some(record) = self.inner.write().get_mut(index) {
            f(record);
        }
    }

    /// Move the module at `index` to `phase` unless that would go backwards or
    /// leave `Failed`.
    pub(crate) fn advance(&self, index: usize, phase: Phase) {
        self.update(index, |record| {
            if record.phase != Phase::Failed && (phase == Phase::Failed || phase > record.phase) {
                record.phase = phase;
            }
        });
    }
}
