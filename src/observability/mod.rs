//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! fetcher, coordinator, watcher, strategies produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every event carries the target key, URL or path as a structured field
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
