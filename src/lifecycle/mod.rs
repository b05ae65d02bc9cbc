//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Strategy start:
//!     spawn loops, each holding a shutdown receiver
//!
//! Strategy stop (shutdown.rs):
//!     running flag cleared → trigger → loops exit at next select → join
//! ```
//!
//! # Design Decisions
//! - Shutdown is cooperative; in-flight HTTP calls are not aborted
//! - Every spawned loop is joined before `stop()` returns

pub mod shutdown;

pub use shutdown::Shutdown;
