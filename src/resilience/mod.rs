//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch from the configuration center:
//!     → request timeout enforced by the HTTP client
//!     → On transport failure: retries.rs (count, re-dispatch after a fixed delay)
//!     → After the attempt limit: abandon, release waiters
//! ```

pub mod retries;

pub use retries::{RetryPolicy, RetryTracker};
