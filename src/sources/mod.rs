//! Configuration source implementations.

mod cli;
mod config_source;
mod env;
mod file;

pub use cli::CliSource;
pub use config_source::ConfigSource;
pub use env::{DEFAULT_ENV_PREFIX, EnvSource};
pub use file::{FileSource, SUPPORTED_EXTENSIONS, discover_files};
