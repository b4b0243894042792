//! Core configuration management types.
//!
//! The [`ConfigLoader`] merges [`sources`](crate::sources) into a [`Tree`], the
//! [`ConfigStore`] owns the live tree and rebuilds it on reload, and a
//! [`Binding`] keeps one typed, validated sub-tree up to date.

mod binding;
mod loader;
mod path;
mod store;
mod tree;
mod validation;

pub use binding::Binding;
pub use loader::ConfigLoader;
pub use path::{DEFAULT_INSTANCE_NAME, category, module_path};
pub use store::ConfigStore;
pub use tree::{PATH_SEPARATOR, Tree, normalize_key};
pub use validation::Validate;
