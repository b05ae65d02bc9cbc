//! Live file system event handling.
//!
//! # Data Flow
//! ```text
//! notify (OS events, or polling)
//!     → watcher.rs (per-file FsEvent on an mpsc channel)
//!     → classify.rs (Decision)
//!     → file strategy (reload, re-scan, or warn)
//! ```

pub mod classify;
pub mod watcher;

pub use classify::{decide, split_extension, Decision, FsEvent, FsEventKind, WatchRules};
pub use watcher::FileSystemWatcher;
