//! Remote configuration center access.
//!
//! # Data Flow
//! ```text
//! template.rs (URL from key prefix + extension, or extra path)
//!     → fetcher.rs (retry, inline or pooled execution)
//!     → client.rs (conditional GET: If-Modified-Since, If-None-Match)
//!     → FetchResponse { code, body, last_modified }
//! ```

pub mod client;
pub mod fetcher;
pub mod pool;
pub mod template;

pub use client::{
    format_http_date, parse_http_date, FetchRequest, FetchResponse, FetchStatus, HttpClient,
    WebClient,
};
pub use fetcher::{Execution, RemoteFetcher};
pub use pool::WorkerPool;
pub use template::{build_config_url, build_extra_url};
