//! Configuration validation support.

use crate::error::ValidationError;

/// Trait for configuration validation.
///
/// Every type bound through a [`Binding`](crate::core::Binding) implements this
/// trait. The default implementation accepts everything, so types without
/// semantic checks only need an empty `impl`.
///
/// A failed check rejects the value: at bind time the error is returned, on a
/// reload the binding keeps its previous value.
///
/// # Examples
///
/// ```rust
/// use bootkit::core::Validate;
/// use bootkit::error::ValidationError;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, Clone)]
/// struct ServerConfig {
///     port: u16,
///     max_connections: usize,
/// }
///
/// impl Validate for ServerConfig {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.port < 1024 {
///             return Err(ValidationError::invalid_field(
///                 "port",
///                 "must be >= 1024 (privileged ports require root)"
///             ));
///         }
///
///         if self.max_connections == 0 {
///             return Err(ValidationError::invalid_field(
///                 "max_connections",
///                 "must be greater than 0"
///             ));
///         }
///
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

macro_rules! accept_all {
    ($($ty:ty),* $(,)?) => {
        $(impl Validate for $ty {})*
    };
}

accept_all!(bool, i32, i64, u16, u32, u64, usize, f64, String);

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        let errors: Vec<ValidationError> = self.iter().filter_map(|v| v.validate().err()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}
