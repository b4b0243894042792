//! Modules bundled with the runtime.
//!
//! [`ConfigModule`] loads configuration and belongs first in every runtime.
//! [`BindModule`] exposes a typed binding to later modules and
//! [`LoggingModule`] installs the log subscriber from configuration.

mod bind;
mod config;
mod logging;

pub use bind::BindModule;
pub use config::{ConfigModule, DEFAULT_CONFIG_DIRS, DEFAULT_CONFIG_NAME};
pub use logging::{LogFormat, LoggingConfig, LoggingModule};
