//! Local folder loading followed by live reloads.

use async_trait::async_trait;
use notify::Watcher;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::registry::ConfigClass;
use crate::strategy::context::SyncContext;
use crate::strategy::file_once::{FileLoader, FileOnce};
use crate::strategy::{run_blocking, LoadStrategy};
use crate::watch::{FileSystemWatcher, FsEvent};

/// A background loop and the signal that ends it.
pub(crate) struct Background {
    pub(crate) shutdown: Shutdown,
    pub(crate) handle: JoinHandle<()>,
}

impl Background {
    /// Signal the loop and wait for it to exit.
    pub(crate) async fn join(self) {
        let listening = self.shutdown.trigger();
        tracing::debug!(listening, "Stop signal sent to background loop");
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Background loop panicked");
        }
    }
}

pub struct FileWatcher {
    once: FileOnce,
    background: Mutex<Option<Background>>,
}

impl FileWatcher {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            once: FileOnce::new(ctx),
            background: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &Arc<FileLoader> {
        self.once.loader()
    }
}

async fn run_watch_loop(
    loader: Arc<FileLoader>,
    watcher: Box<dyn Watcher + Send>,
    mut events: mpsc::UnboundedReceiver<FsEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    // Dropping the watcher stops event delivery.
    let _watcher = watcher;
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("File watcher received shutdown signal, exiting loop");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::warn!("File watcher event channel closed");
                    break;
                };
                let loader = loader.clone();
                run_blocking(move || {
                    loader.handle_event(&event);
                })
                .await;
            }
        }
    }
}

#[async_trait]
impl LoadStrategy for FileWatcher {
    async fn start(&self) -> bool {
        if !self.once.start().await {
            return false;
        }
        let ctx = self.loader().context();
        let watcher = FileSystemWatcher::new(ctx.folder(), &ctx.config().local_fs);
        match watcher.run() {
            Ok((watcher, events)) => {
                let shutdown = Shutdown::new();
                let handle = tokio::spawn(run_watch_loop(
                    self.loader().clone(),
                    watcher,
                    events,
                    shutdown.subscribe(),
                ));
                *self.background.lock() = Some(Background { shutdown, handle });
            }
            Err(e) => tracing::error!(
                folder = %ctx.folder().display(),
                error = %e,
                "Failed to watch configuration folder, live reload disabled"
            ),
        }
        true
    }

    async fn stop(&self) {
        let background = self.background.lock().take();
        if let Some(background) = background {
            background.join().await;
        }
        self.once.stop().await;
    }

    async fn add(&self, class: ConfigClass) {
        self.once.add(class).await;
    }

    fn is_running(&self) -> bool {
        self.once.is_running()
    }
}
