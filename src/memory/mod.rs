//! In-memory tier of configuration resources.
//!
//! # Data Flow
//! ```text
//! strategy
//!     → store.rs (check_and_prepare: one MemoryFile per identity)
//!     → file.rs (synchronize_with_local / synchronize_with_remote)
//!     → disk.rs (read, write, stamp mtime)
//! ```

pub mod disk;
pub mod file;
pub mod store;

pub use file::{md5_etag, FileIdentity, FileSnapshot, MemoryFile, Reconciled};
pub use store::MemoryFileStore;
