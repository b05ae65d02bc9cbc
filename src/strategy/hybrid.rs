//! Local folder first, then the configuration center.
//!
//! The file stage makes the process usable from the last persisted copy;
//! the web stage overwrites it with newer remote content and mirrors that
//! content back onto disk.

use async_trait::async_trait;
use std::sync::Arc;

use crate::registry::ConfigClass;
use crate::strategy::context::SyncContext;
use crate::strategy::file_once::FileOnce;
use crate::strategy::file_watcher::FileWatcher;
use crate::strategy::web_once::WebOnce;
use crate::strategy::web_watcher::WebWatcher;
use crate::strategy::LoadStrategy;

pub struct Hybrid<F, W> {
    file: F,
    web: W,
}

pub type HybridOnce = Hybrid<FileOnce, WebOnce>;
pub type HybridWatcher = Hybrid<FileWatcher, WebWatcher>;

impl Hybrid<FileOnce, WebOnce> {
    pub fn once(ctx: Arc<SyncContext>) -> Self {
        Self {
            file: FileOnce::new(ctx.clone()),
            web: WebOnce::hybrid(ctx),
        }
    }
}

impl Hybrid<FileWatcher, WebWatcher> {
    pub fn watcher(ctx: Arc<SyncContext>) -> Self {
        Self {
            file: FileWatcher::new(ctx.clone()),
            web: WebWatcher::hybrid(ctx),
        }
    }
}

impl<F, W> Hybrid<F, W> {
    pub fn file_stage(&self) -> &F {
        &self.file
    }

    pub fn web_stage(&self) -> &W {
        &self.web
    }
}

#[async_trait]
impl<F, W> LoadStrategy for Hybrid<F, W>
where
    F: LoadStrategy,
    W: LoadStrategy,
{
    async fn start(&self) -> bool {
        if !self.file.start().await {
            return false;
        }
        if !self.web.start().await {
            self.file.stop().await;
            return false;
        }
        true
    }

    async fn stop(&self) {
        self.web.stop().await;
        self.file.stop().await;
    }

    async fn add(&self, class: ConfigClass) {
        self.file.add(class.clone()).await;
        self.web.add(class).await;
    }

    fn is_running(&self) -> bool {
        self.file.is_running() && self.web.is_running()
    }
}
