//! Configuration management.

use crate::mcp::SessionConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    session: SessionSection,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_path")]
    path: String,
    /// Browser origins accepted in addition to localhost
    #[serde(default)]
    allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSection {
    #[serde(default = "default_json_response")]
    json_response: bool,
    #[serde(default = "default_event_buffer")]
    event_buffer: usize,
    #[serde(default = "default_keep_alive_secs")]
    keep_alive_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            json_response: default_json_response(),
            event_buffer: default_event_buffer(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Path to log file (if set, logs are written to the file in addition to the console)
    pub log_file: Option<PathBuf>,
    /// Log level filter such as `debug` or `abacus=trace`.
    /// If not set, uses the RUST_LOG environment variable or defaults to "info"
    pub log_level: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    abacus_types::DEFAULT_PORT
}

fn default_path() -> String {
    abacus_types::DEFAULT_ENDPOINT_PATH.to_string()
}

fn default_json_response() -> bool {
    true
}

fn default_event_buffer() -> usize {
    100
}

fn default_keep_alive_secs() -> u64 {
    15
}

/// Values given on the command line. `None` leaves the lower layers in charge.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub log_level: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path of the MCP endpoint
    pub path: String,
    /// Extra origins accepted by the DNS rebinding check
    pub allowed_origins: Vec<String>,
    /// Answer POSTs with JSON instead of SSE
    pub json_response: bool,
    /// Capacity of each session's outbound channel
    pub event_buffer: usize,
    /// SSE keep-alive interval
    pub keep_alive: Duration,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `config.toml` in user config directory (~/.config/abacus/ on Linux)
    /// 2. `.abacus.toml` in current directory
    ///
    /// Environment variables use the `ABACUS_` prefix with `__` between section and
    /// key, e.g. `ABACUS_SERVER__PORT=4000` or `ABACUS_SESSION__JSON_RESPONSE=false`.
    pub fn from_figment(cli: CliOverrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".abacus.toml"));
        let user_config = directories::ProjectDirs::from("", "", "abacus")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("ABACUS_").split("__"));

        if let Some(ref host) = cli.host {
            figment = figment.merge(Serialized::default("server.host", host));
        }
        if let Some(port) = cli.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        if let Some(ref path) = cli.path {
            figment = figment.merge(Serialized::default("server.path", path));
        }
        if let Some(ref level) = cli.log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if !file.server.path.starts_with('/') || file.server.path.len() < 2 {
            anyhow::bail!(
                "server.path must be an absolute path below the root, got '{}'",
                file.server.path
            );
        }

        Ok(Self {
            host: file.server.host,
            port: file.server.port,
            path: file.server.path,
            allowed_origins: file.server.allowed_origins,
            json_response: file.session.json_response,
            event_buffer: file.session.event_buffer.max(1),
            keep_alive: Duration::from_secs(file.session.keep_alive_secs.max(1)),
            logging: file.logging,
        })
    }

    /// Transport settings applied to every new session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            json_response: self.json_response,
            event_buffer: self.event_buffer,
            keep_alive: self.keep_alive,
            ..SessionConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            host: file.server.host,
            port: file.server.port,
            path: file.server.path,
            allowed_origins: file.server.allowed_origins,
            json_response: file.session.json_response,
            event_buffer: file.session.event_buffer,
            keep_alive: Duration::from_secs(file.session.keep_alive_secs),
            logging: file.logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "ABACUS_SERVER__PORT",
        "ABACUS_SERVER__PATH",
        "ABACUS_SESSION__JSON_RESPONSE",
    ];

    /// Run `f` inside a temp directory holding `local_config` as `.abacus.toml`.
    fn with_local_config<T>(local_config: Option<&str>, f: impl FnOnce() -> T) -> T {
        let temp_dir = TempDir::new().unwrap();
        if let Some(content) = local_config {
            fs::write(temp_dir.path().join(".abacus.toml"), content).unwrap();
        }

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();
        let result = f();
        // Restore before temp_dir is dropped, ignore errors
        let _ = std::env::set_current_dir(original_dir);
        result
    }

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_figment_defaults() {
        clear_env();
        let config = with_local_config(None, || Config::from_figment(CliOverrides::default()))
            .unwrap();

        assert_eq!(config.port, abacus_types::DEFAULT_PORT);
        assert_eq!(config.path, "/mcp");
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.json_response);
        assert_eq!(config.event_buffer, 100);
        assert_eq!(config.keep_alive, Duration::from_secs(15));
        assert!(config.logging.log_level.is_none());
    }

    #[test]
    #[serial]
    fn test_from_figment_config_file() {
        clear_env();
        let content = r#"
[server]
port = 7777
allowed_origins = ["https://app.example.com"]

[session]
json_response = false
keep_alive_secs = 30

[logging]
log_level = "debug"
"#;
        let config = with_local_config(Some(content), || {
            Config::from_figment(CliOverrides::default())
        })
        .unwrap();

        assert_eq!(config.port, 7777);
        assert_eq!(config.allowed_origins, vec!["https://app.example.com"]);
        assert!(!config.json_response);
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.logging.log_level.as_deref(), Some("debug"));

        let session = config.session_config();
        assert!(!session.json_response);
        assert_eq!(session.event_buffer, 100);
    }

    #[test]
    #[serial]
    fn test_from_figment_env_vars_override_config_file() {
        clear_env();
        std::env::set_var("ABACUS_SERVER__PORT", "8888");
        std::env::set_var("ABACUS_SESSION__JSON_RESPONSE", "false");

        let config = with_local_config(Some("[server]\nport = 7777"), || {
            Config::from_figment(CliOverrides::default())
        });
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.port, 8888);
        assert!(!config.json_response);
    }

    #[test]
    #[serial]
    fn test_from_figment_cli_overrides_env_and_config() {
        clear_env();
        std::env::set_var("ABACUS_SERVER__PORT", "8888");

        let config = with_local_config(Some("[server]\nport = 7777"), || {
            Config::from_figment(CliOverrides {
                port: Some(9999),
                path: Some("/rpc".to_string()),
                ..CliOverrides::default()
            })
        });
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.path, "/rpc");
    }

    #[test]
    #[serial]
    fn test_rejects_relative_endpoint_path() {
        clear_env();
        let result = with_local_config(Some("[server]\npath = \"mcp\""), || {
            Config::from_figment(CliOverrides::default())
        });
        assert!(result.is_err());
    }
}
