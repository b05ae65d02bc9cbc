//! config-sync
//!
//! Runs a load strategy against a configuration folder and, optionally, a
//! remote configuration center.
//!
//! # Architecture Overview
//!
//! ```text
//!   configuration center (HTTP)          configuration folder
//!              │                                  │
//!              ▼                                  ▼
//!   ┌──────────────────┐               ┌────────────────────┐
//!   │ remote fetcher   │               │ folder watcher     │
//!   │ retry + pool     │               │ notify / polling   │
//!   └────────┬─────────┘               └─────────┬──────────┘
//!            │                                   │
//!            ▼                                   ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ memory file store (one MemoryFile per resource)         │
//!   └────────────────────────────┬────────────────────────────┘
//!                                │
//!                                ▼
//!   ┌──────────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ coordinator      │──▶│ parser       │──▶│ LiveConfig   │
//!   │ in-order applies │   │ (properties) │   │ snapshots    │
//!   └──────────────────┘   └──────────────┘   └──────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use config_sync::codec::CodecRegistry;
use config_sync::config::validation::validate_config;
use config_sync::config::{load_config, ConfigError, SyncConfig};
use config_sync::live::{ConfigTarget, LiveConfig, Schema};
use config_sync::memory::md5_etag;
use config_sync::observability::{logging, metrics};
use config_sync::parser::properties::PropertiesParserFactory;
use config_sync::parser::{ParseFlags, ParseOutcome};
use config_sync::registry::ConfigClass;
use config_sync::remote::{
    build_config_url, format_http_date, FetchRequest, HttpClient, WebClient,
};
use config_sync::strategy::{build_strategy, StrategyKind, SyncContext};

#[derive(Parser)]
#[command(name = "config-sync", version)]
#[command(
    about = "Keep configuration in sync with a folder and a configuration center",
    long_about = None
)]
struct Cli {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load configuration and keep it in sync until Ctrl-C
    Run {
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
        /// Configuration folder
        #[arg(short, long)]
        folder: Option<PathBuf>,
        /// Load once and exit instead of watching
        #[arg(long)]
        once: bool,
    },
    /// Fetch one file from the configuration center and print the response
    Fetch {
        /// Key prefix, e.g. `config` for the main file
        key_prefix: String,
        #[arg(short, long, default_value = ".ini")]
        extension: String,
    },
}

/// Settings of the demo application bound to `app.*` keys.
#[derive(Debug, Clone, PartialEq)]
struct AppSettings {
    name: String,
    port: u16,
    debug: bool,
    secret: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "demo".into(),
            port: 8080,
            debug: false,
            secret: String::new(),
        }
    }
}

fn app_settings() -> LiveConfig<AppSettings> {
    let schema = Schema::new()
        .parsed("name", |s: &mut AppSettings, v: String| s.name = v)
        .parsed("port", |s: &mut AppSettings, v: u16| s.port = v)
        .parsed("debug", |s: &mut AppSettings, v: bool| s.debug = v)
        .parsed("secret", |s: &mut AppSettings, v: String| s.secret = v)
        .local_only("secret")
        .validate(|s: &AppSettings| {
            if s.port == 0 {
                Err("port must be greater than 0".into())
            } else {
                Ok(())
            }
        });
    LiveConfig::new(AppSettings::default(), schema)
}

/// Logs every snapshot that gets stored.
struct Logged(LiveConfig<AppSettings>);

impl ConfigTarget for Logged {
    fn apply(&self, values: &[(String, String)], flags: ParseFlags) -> ParseOutcome {
        let outcome = self.0.apply(values, flags | ParseFlags::VALIDATE);
        if outcome == ParseOutcome::Applied && !flags.contains(ParseFlags::CHECK) {
            let current = self.0.load();
            tracing::info!(
                name = %current.name,
                port = current.port,
                debug = current.debug,
                remote = flags.contains(ParseFlags::REMOTE),
                "AppSettings updated"
            );
        }
        outcome
    }
}

fn settings(path: Option<&PathBuf>) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(SyncConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = settings(cli.config.as_ref())?;
    logging::init_tracing(&config.observability.log_filter);

    match cli.command {
        Commands::Run {
            strategy,
            folder,
            once,
        } => {
            if let Some(strategy) = strategy {
                config.general.strategy = strategy;
            }
            if let Some(folder) = folder {
                config.general.folder = folder;
            }
            if once {
                config.general.strategy = config.general.strategy.once();
            }
            validate_config(&config).map_err(ConfigError::Validation)?;
            run(config).await
        }
        Commands::Fetch {
            key_prefix,
            extension,
        } => fetch(config, &key_prefix, &extension).await,
    }
}

async fn run(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "config-sync starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let kind = config.general.strategy;
    tracing::info!(
        strategy = %kind,
        folder = %config.general.folder.display(),
        remote = ?config.remote.server_url_prefix,
        "Configuration loaded"
    );

    let ctx = Arc::new(SyncContext::new(config, Arc::new(PropertiesParserFactory))?);
    let strategy = build_strategy(kind, ctx);
    strategy
        .add(ConfigClass::new(
            "AppSettings",
            Some("app"),
            Arc::new(Logged(app_settings())),
        ))
        .await;

    if !strategy.start().await {
        return Err("strategy already running".into());
    }

    if kind.once() != kind {
        tracing::info!("Watching for configuration changes, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, initiating graceful shutdown");
    }
    strategy.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn fetch(
    config: SyncConfig,
    key_prefix: &str,
    extension: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = build_config_url(&config.remote, key_prefix, extension)
        .ok_or("remote.server_url_prefix is not set")?;
    let client = HttpClient::new(&config.http_pool, &config.remote)?;
    let codecs = CodecRegistry::with_defaults();

    let mut request = FetchRequest::new(url.clone());
    request.user = config.remote.auth_user.clone();
    request.password = config
        .remote
        .auth_password
        .as_deref()
        .map(|raw| codecs.decode_value(raw))
        .transpose()?;
    let response = client.fetch(&request).await?;

    let body = response.body.as_deref().unwrap_or_default();
    let output = serde_json::json!({
        "url": url,
        "code": response.code,
        "last_modified": format_http_date(response.last_modified),
        "size": body.len(),
        "md5_etag": response.body.as_deref().map(md5_etag),
        "body": String::from_utf8_lossy(body),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
