//! Loading from the configuration center followed by periodic refreshes.
//!
//! # Data Flow
//! ```text
//! add(class) → defaults applied → add queue ─┐
//!                                            ├→ refresh loop
//! every web_request_interval ────────────────┘     → synchronize_class (bounded wait)
//!                                                  → or full refresh → marker when idle
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::lifecycle::Shutdown;
use crate::registry::ConfigClass;
use crate::strategy::context::SyncContext;
use crate::strategy::file_watcher::Background;
use crate::strategy::web_once::{WebLoader, WebOnce};
use crate::strategy::{run_blocking, LoadStrategy};

pub struct WebWatcher {
    once: WebOnce,
    adds: Mutex<Option<mpsc::UnboundedSender<ConfigClass>>>,
    background: Mutex<Option<Background>>,
}

impl WebWatcher {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self::around(WebOnce::new(ctx))
    }

    /// Stage of a hybrid strategy, see [`WebOnce::hybrid`].
    pub fn hybrid(ctx: Arc<SyncContext>) -> Self {
        Self::around(WebOnce::hybrid(ctx))
    }

    fn around(once: WebOnce) -> Self {
        Self {
            once,
            adds: Mutex::new(None),
            background: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &Arc<WebLoader> {
        self.once.loader()
    }
}

/// Full refresh: fetch everything, give the responses one request timeout,
/// then record the synchronization if nothing is left in flight.
async fn refresh(loader: &Arc<WebLoader>) {
    loader.fetch_all_configurations().await;
    loader.fetch_all_resource_files().await;
    let timeout = loader.context().config().remote.web_request_timeout();
    if loader.wait_for_drain(timeout).await {
        loader.flush().await;
        loader.write_marker_if_idle();
    }
}

async fn run_refresh_loop(
    loader: Arc<WebLoader>,
    mut adds: mpsc::UnboundedReceiver<ConfigClass>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let remote = &loader.context().config().remote;
    let interval = remote.web_request_interval();
    let timeout = remote.web_request_timeout();
    let mut next_refresh = Instant::now() + interval;

    tracing::info!(interval_ms = interval.as_millis() as u64, "Remote refresh loop starting");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Remote refresh loop received shutdown signal, exiting loop");
                break;
            }
            Some(class) = adds.recv() => {
                loader.synchronize_class(&class, Some(timeout)).await;
                // A class just fetched does not need the full refresh right away.
                next_refresh = next_refresh.max(Instant::now() + interval / 2);
            }
            _ = tokio::time::sleep_until(next_refresh) => {
                refresh(&loader).await;
                next_refresh = Instant::now() + interval;
            }
        }
    }
}

#[async_trait]
impl LoadStrategy for WebWatcher {
    async fn start(&self) -> bool {
        if !self.once.start().await {
            return false;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_refresh_loop(
            self.loader().clone(),
            rx,
            shutdown.subscribe(),
        ));
        *self.adds.lock() = Some(tx);
        *self.background.lock() = Some(Background { shutdown, handle });
        true
    }

    async fn stop(&self) {
        self.adds.lock().take();
        let background = self.background.lock().take();
        if let Some(background) = background {
            background.join().await;
        }
        self.once.stop().await;
    }

    async fn add(&self, class: ConfigClass) {
        self.loader().context().registry().register(class.clone());
        if !self.is_running() {
            return;
        }
        let loader = self.loader().clone();
        let for_defaults = class.clone();
        run_blocking(move || loader.apply_defaults(&for_defaults)).await;
        if let Some(adds) = self.adds.lock().as_ref() {
            let _ = adds.send(class);
        }
    }

    fn is_running(&self) -> bool {
        self.once.is_running()
    }
}
