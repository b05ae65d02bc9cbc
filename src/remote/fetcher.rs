//! Fetch execution with bounded retry.
//!
//! # Responsibilities
//! - Run one conditional GET to a terminal outcome
//! - Re-dispatch transport failures after a fixed delay, up to the attempt limit
//! - Execute inline or on the bounded worker pool
//!
//! # Data Flow
//! ```text
//! dispatch(request, on_done)
//!     → Inline: fetch().await → on_done
//!     → Pooled: wait for a worker slot → spawn(fetch → on_done)
//!
//! fetch(request)
//!     → client.fetch
//!         → response: clear failure counter → return
//!         → transport error: count → retry after delay | abandon (code 0)
//! ```

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::observability::metrics;
use crate::remote::client::{FetchRequest, FetchResponse, FetchStatus, HttpClient, WebClient};
use crate::remote::pool::WorkerPool;
use crate::resilience::{RetryPolicy, RetryTracker};

/// Where fetches run.
#[derive(Debug, Clone)]
pub enum Execution {
    /// On the caller's task; dispatch returns after completion.
    Inline,
    /// On the worker pool; dispatch returns once the fetch has a slot.
    Pooled(WorkerPool),
}

pub struct RemoteFetcher {
    client: Arc<dyn WebClient>,
    policy: RetryPolicy,
    tracker: RetryTracker,
    execution: Execution,
}

impl RemoteFetcher {
    pub fn new(client: Arc<dyn WebClient>, policy: RetryPolicy, execution: Execution) -> Self {
        Self {
            client,
            policy,
            tracker: RetryTracker::new(),
            execution,
        }
    }

    /// Build the reqwest backed fetcher described by `config`.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let client = HttpClient::new(&config.http_pool, &config.remote)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Fetcher using `client` with the retry and execution settings of `config`.
    pub fn with_client(config: &SyncConfig, client: Arc<dyn WebClient>) -> Self {
        let execution = if config.http_pool.synchronous {
            Execution::Inline
        } else {
            Execution::Pooled(WorkerPool::new(config.http_pool.max_workers))
        };
        Self::new(client, RetryPolicy::from_config(&config.retry), execution)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `request` until it yields a response or the attempt limit is reached.
    ///
    /// An abandoned request resolves to code 0.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        loop {
            match self.client.fetch(request).await {
                Ok(response) => {
                    self.tracker.clear(&request.url);
                    metrics::record_fetch(response.code);
                    match response.status() {
                        FetchStatus::NotFound => {
                            tracing::warn!(url = %request.url, "Configuration resource not found")
                        }
                        FetchStatus::Unexpected(code) => {
                            tracing::warn!(url = %request.url, code, "Unexpected response code")
                        }
                        _ => {}
                    }
                    return response;
                }
                Err(e) => {
                    metrics::record_fetch(0);
                    let failures = self.tracker.record_failure(&request.url);
                    if self.policy.should_retry(failures) {
                        tracing::warn!(
                            url = %request.url,
                            failures,
                            error = %e,
                            "Fetch failed, retrying"
                        );
                        metrics::record_fetch_retry();
                        tokio::time::sleep(self.policy.delay).await;
                        continue;
                    }
                    tracing::error!(
                        url = %request.url,
                        failures,
                        error = %e,
                        "Fetch abandoned after consecutive transport failures"
                    );
                    self.tracker.clear(&request.url);
                    return FetchResponse::transport_failure();
                }
            }
        }
    }

    /// Fetch `request` and hand the terminal response to `on_done`.
    pub async fn dispatch<F>(self: &Arc<Self>, request: FetchRequest, on_done: F)
    where
        F: FnOnce(FetchResponse) + Send + 'static,
    {
        match &self.execution {
            Execution::Inline => {
                let response = self.fetch(&request).await;
                on_done(response);
            }
            Execution::Pooled(pool) => {
                let fetcher = self.clone();
                pool.spawn(async move {
                    let response = fetcher.fetch(&request).await;
                    on_done(response);
                })
                .await;
            }
        }
    }
}
