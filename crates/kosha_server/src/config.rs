//! I define the server configuration model and its loading.
//!

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Behavior on tls certificate/key load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsFailurePolicy {
    /// Refuse to start. The default.
    Fail,

    /// Log the error and serve plain http instead.
    FallbackHttp,
}

/// Tls configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Whether tls is enabled.
    pub enabled: bool,

    /// Certificate pem file path.
    pub cert_file: PathBuf,

    /// Key pem file path.
    pub key_file: PathBuf,

    /// What to do when the certificate or key cannot be
    /// loaded.
    pub on_load_failure: TlsFailurePolicy,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_file: PathBuf::new(),
            key_file: PathBuf::new(),
            on_load_failure: TlsFailurePolicy::Fail,
        }
    }
}

/// Http listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listener network: `tcp`, `tcp4`, or `tcp6`.
    pub network: String,

    /// Listen address, `[host]:port`. A bare `:port` binds all
    /// interfaces; port `0` binds an ephemeral port (the bound
    /// address is logged).
    pub addr: String,

    /// Whole-request timeout, in seconds.
    pub timeout: u64,

    /// Read timeout, in seconds.
    pub read_timeout: u64,

    /// Write timeout, in seconds.
    pub write_timeout: u64,

    /// Graceful shutdown drain timeout, in seconds.
    pub shutdown_timeout: u64,

    /// Maximum header size, in bytes.
    pub max_header_bytes: usize,

    /// Tls configuration.
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            network: "tcp".into(),
            addr: ":8080".into(),
            timeout: 30,
            read_timeout: 30,
            write_timeout: 30,
            shutdown_timeout: 10,
            max_header_bytes: 1 << 20,
            tls: TlsConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Http listener configuration.
    pub http: HttpConfig,

    /// Public base uri of this server, used for minted
    /// webids. Must be https.
    pub base_uri: String,
}

/// Storage paths configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory of the resource and user file stores.
    pub base_dir: PathBuf,

    /// Path of the sqlite database file.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data"),
            db_path: PathBuf::from("./data/kosha.db"),
        }
    }
}

/// Whole application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,

    /// Storage configuration.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration: `config.yaml` from given directory
    /// (when present), overridden by `KOSHA`-prefixed
    /// environment variables with `__`-separated paths
    /// (`KOSHA_SERVER__HTTP__ADDR`). Environment values are
    /// authoritative.
    pub fn load(conf_dir: &Path) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(File::from(conf_dir.join("config.yaml")).required(false))
            .add_source(Environment::with_prefix("KOSHA").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Public base uri, with a usable default for local runs.
    pub fn base_uri(&self) -> String {
        if self.server.base_uri.is_empty() {
            "https://localhost".to_owned()
        } else {
            self.server.base_uri.trim_end_matches('/').to_owned()
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use claims::assert_ok;

    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = AppConfig::default();
        assert_eq!(config.server.http.network, "tcp");
        assert_eq!(config.server.http.addr, ":8080");
        assert_eq!(config.server.http.timeout, 30);
        assert_eq!(config.server.http.read_timeout, 30);
        assert_eq!(config.server.http.write_timeout, 30);
        assert_eq!(config.server.http.shutdown_timeout, 10);
        assert_eq!(config.server.http.max_header_bytes, 1024 * 1024);
        assert!(!config.server.http.tls.enabled);
        assert_eq!(
            config.server.http.tls.on_load_failure,
            TlsFailurePolicy::Fail
        );
    }

    #[test]
    fn file_values_load_and_env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "server:\n  http:\n    addr: \":9090\"\n    timeout: 12\n",
        )
        .unwrap();

        let loaded = assert_ok!(AppConfig::load(dir.path()));
        assert_eq!(loaded.server.http.addr, ":9090");
        assert_eq!(loaded.server.http.timeout, 12);

        std::env::set_var("KOSHA_SERVER__HTTP__ADDR", ":7070");
        let overridden = assert_ok!(AppConfig::load(dir.path()));
        std::env::remove_var("KOSHA_SERVER__HTTP__ADDR");
        assert_eq!(overridden.server.http.addr, ":7070");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = assert_ok!(AppConfig::load(dir.path()));
        assert_eq!(loaded.server.http.addr, ":8080");
    }
}
