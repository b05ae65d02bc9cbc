//! Load strategies.
//!
//! # Responsibilities
//! - Decide where configuration comes from (folder, center, or both)
//! - Decide whether it is loaded once or kept in sync
//! - Own the background loops and stop them cooperatively
//!
//! # Data Flow
//! ```text
//! FileOnce      → file_once.rs (main file, class files, resources)
//! FileWatcher   → FileOnce + watch loop (FsEvent → Decision → reload)
//! WebOnce       → web_once.rs (fetch → MemoryFile → coordinator → parser)
//! WebWatcher    → WebOnce + refresh loop (add queue, interval refresh)
//! Hybrid*       → file stage, then web stage persisting to disk
//! ```
//!
//! # Design Decisions
//! - Every strategy shares one [`SyncContext`] (store, registry, parsers)
//! - `start` returns false when already running
//! - `stop` joins every loop it spawned; in-flight HTTP calls are not aborted

pub mod context;
pub mod file_once;
pub mod file_watcher;
pub mod hybrid;
pub mod layout;
pub mod marker;
pub mod web_once;
pub mod web_watcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::registry::ConfigClass;

pub use context::SyncContext;
pub use file_once::{FileLoader, FileOnce};
pub use file_watcher::FileWatcher;
pub use hybrid::{Hybrid, HybridOnce, HybridWatcher};
pub use web_once::{WebLoader, WebOnce};
pub use web_watcher::WebWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    FileOnce,
    #[default]
    FileWatcher,
    WebOnce,
    WebWatcher,
    HybridOnce,
    HybridWatcher,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::FileOnce,
        StrategyKind::FileWatcher,
        StrategyKind::WebOnce,
        StrategyKind::WebWatcher,
        StrategyKind::HybridOnce,
        StrategyKind::HybridWatcher,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::FileOnce => "file-once",
            StrategyKind::FileWatcher => "file-watcher",
            StrategyKind::WebOnce => "web-once",
            StrategyKind::WebWatcher => "web-watcher",
            StrategyKind::HybridOnce => "hybrid-once",
            StrategyKind::HybridWatcher => "hybrid-watcher",
        }
    }

    /// Whether the strategy talks to the configuration center.
    pub fn uses_remote(self) -> bool {
        !matches!(self, StrategyKind::FileOnce | StrategyKind::FileWatcher)
    }

    /// The variant that loads once instead of staying in sync.
    pub fn once(self) -> StrategyKind {
        match self {
            StrategyKind::FileWatcher => StrategyKind::FileOnce,
            StrategyKind::WebWatcher => StrategyKind::WebOnce,
            StrategyKind::HybridWatcher => StrategyKind::HybridOnce,
            other => other,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown strategy '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Lifecycle of a configuration source: `Stopped → Running → Stopped`.
#[async_trait]
pub trait LoadStrategy: Send + Sync {
    /// Load everything and start background work. False when already running.
    async fn start(&self) -> bool;

    /// Stop background work and wait for it to finish.
    async fn stop(&self);

    /// Register `class`, loading it right away when running.
    async fn add(&self, class: ConfigClass);

    fn is_running(&self) -> bool;
}

pub fn build_strategy(kind: StrategyKind, ctx: Arc<SyncContext>) -> Box<dyn LoadStrategy> {
    match kind {
        StrategyKind::FileOnce => Box::new(FileOnce::new(ctx)),
        StrategyKind::FileWatcher => Box::new(FileWatcher::new(ctx)),
        StrategyKind::WebOnce => Box::new(WebOnce::new(ctx)),
        StrategyKind::WebWatcher => Box::new(WebWatcher::new(ctx)),
        StrategyKind::HybridOnce => Box::new(HybridOnce::once(ctx)),
        StrategyKind::HybridWatcher => Box::new(HybridWatcher::watcher(ctx)),
    }
}

/// Run blocking work (disk IO, parsing) off the async workers.
pub(crate) async fn run_blocking<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = tokio::task::spawn_blocking(work).await {
        tracing::error!(error = %e, "Blocking task panicked");
    }
}
