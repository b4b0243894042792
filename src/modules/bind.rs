//! Binding a configuration path as a module.

use crate::core::{Binding, Validate};
use crate::runtime::{BoxError, InitContext, Module, ShutdownContext};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Binds one configuration path during init and provides the binding.
///
/// Later modules fetch it with `ctx.require::<Arc<Binding<T>>>()`. A value that
/// does not decode or validate fails init and aborts the runtime. Each `T` can be
/// provided once; a second `BindModule` for the same type replaces the first.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::core::Validate;
/// use bootkit::modules::{BindModule, ConfigModule};
/// use bootkit::runtime::Runtime;
///
/// #[derive(serde::Deserialize)]
/// struct Limits {
///     max_connections: u32,
/// }
///
/// impl Validate for Limits {}
///
/// let runtime = Runtime::new()
///     .with_module(ConfigModule::new())
///     .with_module(BindModule::<Limits>::new("app.limits"));
/// ```
pub struct BindModule<T> {
    path: String,
    binding: Option<Arc<Binding<T>>>,
}

impl<T> BindModule<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    /// Bind the dotted `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            binding: None,
        }
    }

    /// The binding, once the module has been initialized.
    pub fn binding(&self) -> Option<&Arc<Binding<T>>> {
        self.binding.as_ref()
    }
}

#[async_trait]
impl<T> Module for BindModule<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    async fn init(&mut self, ctx: &mut InitContext) -> Result<(), BoxError> {
        let store = ctx.config()?;
        let binding = Arc::new(Binding::<T>::bind(&store, &self.path)?);
        ctx.provide(Arc::clone(&binding));
        self.binding = Some(binding);
        Ok(())
    }

    async fn shutdown(&self, _ctx: ShutdownContext) -> Result<(), BoxError> {
        Ok(())
    }

    fn name(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn kind(&self) -> &'static str {
        "bind"
    }
}
