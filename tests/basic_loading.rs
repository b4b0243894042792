//! Integration tests for layered configuration loading.

use bootkit::core::{Binding, ConfigStore, Validate};
use bootkit::error::ConfigError;
use bootkit::modules::ConfigModule;
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct ServerConfig {
    port: u16,
    host: String,
}

impl Validate for ServerConfig {}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct PoolConfig {
    max_connections: u32,
    idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout_secs: 60,
        }
    }
}

/// Module reading only from `dir` and the given variables.
fn module(dir: &TempDir, vars: &[(&str, &str)]) -> ConfigModule {
    ConfigModule::new()
        .with_config_dirs([dir.path()])
        .with_env_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
}

#[test]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bootkit.yaml"), "app:\n  limit: 100\n").unwrap();

    let tree = module(&dir, &[]).loader().load().unwrap();
    assert_eq!(tree.decode::<i64>("app.limit").unwrap(), 100);

    let tree = module(&dir, &[("BOOTKIT_APP_LIMIT", "200")])
        .loader()
        .load()
        .unwrap();
    assert_eq!(tree.decode::<i64>("app.limit").unwrap(), 200);
}

#[test]
fn test_cli_overrides_env() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bootkit.yaml"),
        "server:\n  port: 8080\n  host: localhost\n",
    )
    .unwrap();

    let tree = module(&dir, &[("BOOTKIT_SERVER_PORT", "9090")])
        .with_args(["--server.port=7070", "--server.host", "0.0.0.0"])
        .loader()
        .load()
        .unwrap();

    let server: ServerConfig = tree.decode("server").unwrap();
    assert_eq!(
        server,
        ServerConfig {
            port: 7070,
            host: "0.0.0.0".to_string()
        }
    );
}

#[test]
fn test_unknown_flag_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bootkit.yaml"), "server:\n  port: 8080\n").unwrap();

    let err = module(&dir, &[])
        .with_args(["--server.prot=1"])
        .loader()
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("cli"));
}

#[test]
fn test_later_directories_and_extensions_win() {
    let base = TempDir::new().unwrap();
    let overrides = TempDir::new().unwrap();
    fs::write(
        base.path().join("bootkit.yaml"),
        "server:\n  port: 1000\n  host: base\n",
    )
    .unwrap();
    fs::write(base.path().join("bootkit.toml"), "[server]\nport = 2000\n").unwrap();
    fs::write(
        overrides.path().join("bootkit.json"),
        r#"{"server": {"host": "override"}}"#,
    )
    .unwrap();

    let tree = ConfigModule::new()
        .with_config_dirs([base.path(), overrides.path()])
        .with_env_vars(Vec::<(String, String)>::new())
        .loader()
        .load()
        .unwrap();

    let server: ServerConfig = tree.decode("server").unwrap();
    assert_eq!(server.port, 2000);
    assert_eq!(server.host, "override");
}

#[test]
fn test_custom_name_and_prefix() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("service.yml"), "pool:\n  max_connections: 4\n").unwrap();
    fs::write(dir.path().join("bootkit.yml"), "pool:\n  max_connections: 99\n").unwrap();

    let tree = module(&dir, &[("SVC__POOL__IDLE_TIMEOUT_SECS", "5")])
        .with_config_name("service")
        .with_env_prefix("SVC__")
        .with_env_separator("__")
        .loader()
        .load()
        .unwrap();

    let pool: PoolConfig = tree.decode("pool").unwrap();
    assert_eq!(
        pool,
        PoolConfig {
            max_connections: 4,
            idle_timeout_secs: 5
        }
    );
}

#[test]
fn test_missing_path_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let tree = module(&dir, &[]).loader().load().unwrap();

    assert!(tree.is_empty());
    let pool: PoolConfig = tree.decode("pool").unwrap();
    assert_eq!(pool, PoolConfig::default());
}

#[test]
fn test_malformed_file_fails_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bootkit.yaml");
    fs::write(&path, "server: [unclosed\n").unwrap();

    let err = module(&dir, &[]).loader().load().unwrap_err();
    assert!(matches!(err, ConfigError::LoadError(_)));
    assert!(err.to_string().contains("bootkit.yaml"));
}

#[test]
fn test_explicit_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let err = module(&dir, &[])
        .with_file(dir.path().join("absent.toml"))
        .loader()
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_binding_equals_decode() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bootkit.toml"),
        "[server]\nport = 8443\nhost = \"example.org\"\n",
    )
    .unwrap();

    let store = ConfigStore::load(module(&dir, &[]).loader()).unwrap();
    let binding: Binding<ServerConfig> = store.bind("server").unwrap();

    assert_eq!(*binding.get(), store.decode::<ServerConfig>("server").unwrap());
    assert_eq!(binding.path(), "server");
}
