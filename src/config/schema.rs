//! Engine settings schema.
//!
//! This module defines the complete settings structure for the
//! synchronization engine. All types derive Serde traits for deserialization
//! from a TOML file and every field has a default, so an empty file is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::strategy::StrategyKind;

/// Root settings for the synchronization engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Folder layout, main file and scanning order.
    pub general: GeneralConfig,

    /// Local file system watching.
    pub local_fs: LocalFsConfig,

    /// Remote configuration center.
    pub remote: RemoteConfig,

    /// Fetch worker pool and HTTP connection settings.
    pub http_pool: HttpPoolConfig,

    /// Retry policy for transport failures.
    pub retry: RetryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Folder layout and file resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Configuration folder.
    pub folder: PathBuf,

    /// Main configuration file name, without extension.
    pub main_name: String,

    /// Main configuration file extension, with the leading dot.
    pub main_extension: String,

    /// Extensions probed for each key prefix, in precedence order.
    pub scanning_extensions: Vec<String>,

    /// One file per key prefix (true) or everything in the main file (false).
    pub multiple_files: bool,

    /// Dry-run every update with CHECK before applying it.
    pub skip_invalid_update: bool,

    /// Strategy started by the binary.
    pub strategy: StrategyKind,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            main_name: "config".to_string(),
            main_extension: ".ini".to_string(),
            scanning_extensions: [
                ".js", ".json", ".xml", ".ini", ".properties", ".props", ".config", ".conf",
                ".cfg", ".txt",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            multiple_files: true,
            skip_invalid_update: false,
            strategy: StrategyKind::FileWatcher,
        }
    }
}

/// Local file updates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalFsConfig {
    /// Use OS notifications. If false, the folder is polled instead.
    pub enable_file_watcher: bool,

    /// Interval between checks in polling mode, in seconds.
    pub polling_interval_secs: u64,
}

impl Default for LocalFsConfig {
    fn default() -> Self {
        Self {
            enable_file_watcher: true,
            polling_interval_secs: 10,
        }
    }
}

impl LocalFsConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs.max(1))
    }
}

/// Remote configuration center.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the configuration center.
    pub server_url_prefix: Option<String>,

    /// Basic auth user.
    pub auth_user: Option<String>,

    /// Basic auth password, optionally codec encoded (`[base64:...]`).
    pub auth_password: Option<String>,

    /// Name identifying this server at the configuration center.
    pub local_server_name: String,

    /// URL template for configuration files.
    pub target_url_pattern: String,

    /// Timeout of each request, in milliseconds.
    pub web_request_timeout_ms: u64,

    /// Interval between full refreshes, in milliseconds.
    pub web_request_interval_ms: u64,

    /// Send `If-None-Match` with the MD5 of the cached content.
    pub supports_md5_etag: bool,

    /// Extensions allowed for extra resource files.
    pub extra_resource_extensions: Vec<String>,

    /// Extra resource files, relative to the configuration folder.
    pub extra_resource_files: Vec<String>,

    /// URL template for extra resource files.
    pub extra_target_url_pattern: String,

    /// Age after which the `.timestamp` marker no longer counts as synchronized.
    pub synchronized_expiring_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_url_prefix: None,
            auth_user: None,
            auth_password: None,
            local_server_name: "app".to_string(),
            target_url_pattern: concat!(
                "${server.url.prefix}/${local.server.name}/",
                "${config.key.prefix}${config.file.extension}"
            )
            .to_string(),
            web_request_timeout_ms: 2000,
            web_request_interval_ms: 10_000,
            supports_md5_etag: true,
            extra_resource_extensions: [
                ".xml", ".properties", ".props", ".ini", ".txt", ".config", ".conf", ".cfg",
                ".js", ".json", ".key", ".crt", ".pem", ".keystore", ".html", ".htm", ".css",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            extra_resource_files: Vec::new(),
            extra_target_url_pattern: "${server.url.prefix}/${local.server.name}/${extra.file.path}"
                .to_string(),
            synchronized_expiring_interval_ms: 8 * 3600 * 1000,
        }
    }
}

impl RemoteConfig {
    pub fn web_request_timeout(&self) -> Duration {
        Duration::from_millis(self.web_request_timeout_ms)
    }

    pub fn web_request_interval(&self) -> Duration {
        Duration::from_millis(self.web_request_interval_ms)
    }
}

/// Fetch execution and HTTP connection pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpPoolConfig {
    /// Run fetches inline on the caller instead of the worker pool.
    pub synchronous: bool,

    /// Idle connections kept per host.
    pub core_workers: usize,

    /// Maximum concurrent fetches (backpressure beyond this).
    pub max_workers: usize,

    /// Idle connection timeout, in seconds.
    pub worker_idle_secs: u64,

    /// User-Agent header.
    pub user_agent: String,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            synchronous: false,
            core_workers: 1,
            max_workers: 50,
            worker_idle_secs: 30,
            user_agent: format!("config-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Retry policy for transport failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive transport failures after which a fetch is abandoned.
    pub max_attempts: u32,

    /// Fixed delay before a retry, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 10,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "config_sync=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9095".to_string(),
        }
    }
}
