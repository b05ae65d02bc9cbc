//! Configuration synchronization engine.
//!
//! Keeps in-memory configuration consistent with a local folder and a
//! remote configuration center, applying updates in submission order.

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod live;
pub mod memory;
pub mod observability;
pub mod parser;
pub mod registry;
pub mod remote;
pub mod resilience;
pub mod strategy;
pub mod watch;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use live::{ConfigTarget, LiveConfig, Schema};
pub use memory::{MemoryFile, MemoryFileStore};
pub use parser::{ConfigParser, ParseFlags, ParseOutcome, ParserFactory};
pub use registry::ConfigClass;
pub use strategy::{build_strategy, LoadStrategy, StrategyKind, SyncContext};
