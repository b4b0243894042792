//! Conventional configuration paths for modules.

/// Instance name used when a module is not given one.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Module categories used in configuration paths.
pub mod category {
    /// Telemetry exporters.
    pub const OTEL: &str = "otel";
    /// Log output.
    pub const LOGGING: &str = "logging";
    /// Health reporting.
    pub const HEALTH: &str = "health";
    /// HTTP servers and clients.
    pub const HTTP: &str = "http";
    /// gRPC servers and clients.
    pub const GRPC: &str = "grpc";
    /// Database pools.
    pub const DB: &str = "db";
    /// Workflow engines.
    pub const WORKFLOWS: &str = "workflows";
}

/// Build the configuration path for a module instance.
///
/// An empty instance name maps to [`DEFAULT_INSTANCE_NAME`].
///
/// ```rust
/// use bootkit::core::module_path;
///
/// assert_eq!(module_path("grpc", "server", "internal"), "modules.grpc.server.internal");
/// assert_eq!(module_path("http", "server", ""), "modules.http.server.default");
/// ```
pub fn module_path(category: &str, kind: &str, instance: &str) -> String {
    let instance = if instance.is_empty() {
        DEFAULT_INSTANCE_NAME
    } else {
        instance
    };
    format!("modules.{}.{}.{}", category, kind, instance)
}
