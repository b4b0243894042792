//! The contract between the runtime and the subsystems it manages.

use crate::core::Tree;
use crate::runtime::{CancelToken, InitContext, ShutdownContext};
use async_trait::async_trait;

/// Error type returned by module hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How a module participates in the start phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// The module has nothing to start.
    #[default]
    None,
    /// [`Module::start`] runs for the lifetime of the service. Returning `Ok`
    /// ends the start phase and begins shutdown.
    Blocking,
    /// [`Module::start_async`] returns once the module's resource is ready.
    Ready,
}

/// A subsystem managed by the [`Runtime`](crate::runtime::Runtime).
///
/// Only [`init`](Module::init) and [`shutdown`](Module::shutdown) are
/// mandatory. A module that wants to run something after every module has
/// initialized reports a [`StartMode`] and implements the matching hook.
///
/// # Examples
///
/// ```rust
/// use bootkit::runtime::{BoxError, CancelToken, InitContext, Module, ShutdownContext, StartMode};
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Module for Heartbeat {
///     async fn init(&mut self, _ctx: &mut InitContext) -> Result<(), BoxError> {
///         Ok(())
///     }
///
///     fn start_mode(&self) -> StartMode {
///         StartMode::Blocking
///     }
///
///     async fn start(&self, cancel: CancelToken) -> Result<(), BoxError> {
///         cancel.cancelled().await;
///         Ok(())
///     }
///
///     async fn shutdown(&self, _ctx: ShutdownContext) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Prepare the module. Runs strictly in declaration order, so anything an
    /// earlier module provided through `ctx` is visible here.
    async fn init(&mut self, ctx: &mut InitContext) -> Result<(), BoxError>;

    /// Release the module's resources before the deadline in `ctx`.
    async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), BoxError>;

    /// Which start hook the runtime calls.
    fn start_mode(&self) -> StartMode {
        StartMode::None
    }

    /// Blocking start hook, used with [`StartMode::Blocking`].
    async fn start(&self, _cancel: CancelToken) -> Result<(), BoxError> {
        Ok(())
    }

    /// Readiness start hook, used with [`StartMode::Ready`].
    async fn start_async(&self, _cancel: CancelToken) -> Result<(), BoxError> {
        Ok(())
    }

    /// Dotted path of the module's own configuration sub-tree.
    ///
    /// When this returns a path that exists in the loaded tree, the runtime
    /// calls [`load_config`](Module::load_config) right before `init`.
    fn config_path(&self) -> Option<String> {
        None
    }

    /// Decode the module's configuration from `tree`.
    fn load_config(&mut self, _tree: &Tree) -> Result<(), BoxError> {
        Ok(())
    }

    /// Instance name, for modules that can appear more than once.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Category of the module, shown in logs and errors.
    fn kind(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Strip the module path from a type name, keeping generic arguments intact.
fn short_type_name(full: &'static str) -> &'static str {
    let end = full.find('<').unwrap_or(full.len());
    match full[..end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Identity of a module as used in records, logs and errors.
pub(crate) fn identity(module: &dyn Module) -> String {
    match module.name() {
        Some(name) if !name.is_empty() => format!("{}[{}]", module.kind(), name),
        _ => module.kind().to_string(),
    }
}
