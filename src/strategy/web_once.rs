//! Loading from the configuration center.
//!
//! # Responsibilities
//! - Fetch the main file, every class file and the extra resources
//! - Reconcile responses into memory, and onto disk for hybrid strategies
//! - Hand parser work to the coordinator so it runs in submission order
//! - Track requests still in flight
//!
//! # Data Flow
//! ```text
//! synchronize_file
//!     → in_queue[url] += 1, coordinator.enqueue(target key)
//!     → fetcher.dispatch (inline or pooled, retried)
//!     → handle_response (blocking pool)
//!         → 200 with new bytes: MemoryFile update (+ disk), parser action
//!         → otherwise: no action
//!     → coordinator.complete(target key, action), in_queue[url] -= 1
//! ```
//!
//! # Design Decisions
//! - A class whose extension is unknown is probed with every scanning
//!   extension; the coordinator keeps the first one that answers with content
//! - Extra resources are only mirrored, never parsed

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::coordinator::{target_key, ApplyAction, Coordinator};
use crate::memory::{disk, MemoryFile};
use crate::observability::metrics;
use crate::parser::{apply_parser, ConfigParser, ParseFlags};
use crate::registry::ConfigClass;
use crate::remote::{build_config_url, build_extra_url, FetchRequest, FetchResponse, FetchStatus};
use crate::strategy::context::SyncContext;
use crate::strategy::layout::{extension_order, extra_identity};
use crate::strategy::marker;
use crate::strategy::{run_blocking, LoadStrategy};

fn remote_update() -> ParseFlags {
    ParseFlags::UPDATE | ParseFlags::REMOTE
}

/// What a fetched resource is applied to.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Main,
    Class(ConfigClass),
    /// Extra resource, by path relative to the folder.
    Extra(String),
}

impl Target {
    /// Class identifier part of the target key.
    fn queue_id(&self) -> &str {
        match self {
            Target::Main => "*",
            Target::Class(class) => class.name(),
            Target::Extra(path) => path,
        }
    }
}

pub struct WebLoader {
    ctx: Arc<SyncContext>,
    coordinator: OnceLock<Coordinator>,
    /// URL → submissions not yet answered.
    in_queue: DashMap<String, usize>,
    default_parser: RwLock<Option<Arc<dyn ConfigParser>>>,
    persist_to_disk: bool,
}

impl WebLoader {
    pub fn new(ctx: Arc<SyncContext>, persist_to_disk: bool) -> Self {
        Self {
            ctx,
            coordinator: OnceLock::new(),
            in_queue: DashMap::new(),
            default_parser: RwLock::new(None),
            persist_to_disk,
        }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Spawned on first use so construction does not need a runtime.
    fn coordinator(&self) -> &Coordinator {
        self.coordinator.get_or_init(Coordinator::spawn)
    }

    fn default_parser(&self) -> Option<Arc<dyn ConfigParser>> {
        self.default_parser.read().clone()
    }

    /// URLs with at least one request not yet answered.
    pub fn pending(&self) -> usize {
        self.in_queue.len()
    }

    /// One submission for `url` was answered; the URL stays pending while
    /// others are outstanding.
    fn release(&self, url: &str) {
        self.in_queue.remove_if_mut(url, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        metrics::record_inflight(self.in_queue.len());
    }

    /// Fetch `file` from `url` and queue its apply action under `target`.
    ///
    /// With `wait`, returns once the response was handled or the wait elapsed.
    pub(crate) async fn synchronize_file(
        self: &Arc<Self>,
        target: Target,
        file: Arc<MemoryFile>,
        url: Option<String>,
        wait: Option<Duration>,
    ) {
        let Some(url) = url else {
            return;
        };
        *self.in_queue.entry(url.clone()).or_insert(0) += 1;
        metrics::record_inflight(self.in_queue.len());

        let key = target_key(target.queue_id(), &file.identity().extension);
        self.coordinator().enqueue(key.clone());

        let remote = &self.ctx.config().remote;
        let request = FetchRequest {
            url: url.clone(),
            user: remote.auth_user.clone(),
            password: self.ctx.decoded_password(),
            known_modified: file.modified(),
            known_etag: if remote.supports_md5_etag {
                file.md5_etag()
            } else {
                None
            },
        };

        let (done_tx, done_rx) = oneshot::channel();
        let loader = self.clone();
        self.ctx
            .fetcher()
            .dispatch(request, move |response| {
                tokio::task::spawn_blocking(move || {
                    loader.handle_response(target, &file, &url, key, response);
                    let _ = done_tx.send(());
                });
            })
            .await;

        if let Some(wait) = wait {
            let _ = tokio::time::timeout(wait, done_rx).await;
        }
    }

    fn handle_response(
        self: &Arc<Self>,
        target: Target,
        file: &Arc<MemoryFile>,
        url: &str,
        key: String,
        response: FetchResponse,
    ) {
        let resource = file.identity().file_name();
        let mut action = None;
        match (response.status(), response.body) {
            (FetchStatus::Fresh, Some(body)) if !body.is_empty() => {
                let outcome = file.synchronize_with_remote(Some(body), response.last_modified);
                if self.persist_to_disk {
                    if let Err(e) = file.synchronize_with_local(true) {
                        tracing::error!(error = %e, "Failed to save configuration to disk");
                    }
                }
                if outcome.content_changed() {
                    tracing::info!(file = %resource, "Configuration content synchronized remotely");
                    action = self.build_action(target, file.clone());
                }
            }
            (FetchStatus::Fresh, _) => {
                tracing::info!(file = %resource, "Fetched configuration has no content")
            }
            _ => {}
        }
        self.coordinator().complete(key, action);
        self.release(url);
    }

    fn build_action(
        self: &Arc<Self>,
        target: Target,
        file: Arc<MemoryFile>,
    ) -> Option<ApplyAction> {
        let loader = self.clone();
        match target {
            Target::Main => Some(Box::new(move || loader.apply_main(&file))),
            Target::Class(class) => Some(Box::new(move || loader.apply_class(&class, &file))),
            Target::Extra(_) => None,
        }
    }

    fn prepare(&self, file: &MemoryFile, is_main: bool) -> Option<Arc<dyn ConfigParser>> {
        let content = file.content()?;
        let extension = &file.identity().extension;
        match self.ctx.parsers().prepare(extension, &content, is_main) {
            Ok(Some(parser)) => Some(parser),
            Ok(None) => {
                tracing::error!(
                    extension = %extension,
                    "No parser for configuration file extension"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    file = %file.key(),
                    error = %e,
                    "Failed to parse remote configuration"
                );
                None
            }
        }
    }

    /// New main file: becomes the default parser, then every class is
    /// re-layered (defaults first, its own cached file on top).
    fn apply_main(&self, file: &MemoryFile) {
        let Some(parser) = self.prepare(file, true) else {
            return;
        };
        *self.default_parser.write() = Some(parser);
        tracing::info!(file = %file.identity().file_name(), "Main configuration loaded remotely");
        for class in self.ctx.registry().all() {
            self.apply_defaults(&class);
            if let Some(cached) = self.cached_class_file(&class) {
                if let Some(parser) = self.prepare(&cached, false) {
                    apply_parser(parser.as_ref(), &class, remote_update(), self.ctx.skip_invalid());
                }
            }
        }
    }

    fn apply_class(&self, class: &ConfigClass, file: &MemoryFile) {
        let extension = &file.identity().extension;
        self.ctx.registry().record_extension(class.name(), extension);
        let Some(parser) = self.prepare(file, false) else {
            return;
        };
        self.apply_defaults(class);
        apply_parser(parser.as_ref(), class, remote_update(), self.ctx.skip_invalid());
        tracing::info!(
            class = %class.name(),
            file = %file.identity().file_name(),
            "Configuration loaded remotely"
        );
    }

    pub fn apply_defaults(&self, class: &ConfigClass) {
        if let Some(parser) = self.default_parser() {
            apply_parser(parser.as_ref(), class, remote_update(), self.ctx.skip_invalid());
        }
    }

    /// The class's own file at its recorded extension, when it has content.
    fn cached_class_file(&self, class: &ConfigClass) -> Option<Arc<MemoryFile>> {
        if !self.ctx.multiple_files() {
            return None;
        }
        let key_prefix = class.key_prefix()?;
        let extension = self.ctx.registry().extension(class.name())?;
        let file = self
            .ctx
            .store()
            .check_and_prepare(self.ctx.folder(), key_prefix, &extension);
        file.content().is_some().then_some(file)
    }

    /// Fetch the file of `class`.
    ///
    /// A known extension with cached content is fetched alone; otherwise a
    /// cached extension is looked for in precedence order, and without one
    /// every extension is probed.
    pub async fn synchronize_class(self: &Arc<Self>, class: &ConfigClass, wait: Option<Duration>) {
        if !self.ctx.multiple_files() {
            return;
        }
        let Some(key_prefix) = class.key_prefix() else {
            return;
        };
        let ctx = &self.ctx;
        let prepare = |ext: &str| ctx.store().check_and_prepare(ctx.folder(), key_prefix, ext);

        let order = extension_order(&ctx.main_extension(), ctx.scanning_extensions());
        let known = ctx
            .registry()
            .extension(class.name())
            .filter(|ext| prepare(ext).content().is_some());
        let candidates = match known.or_else(|| {
            order
                .iter()
                .find(|ext| prepare(ext).content().is_some())
                .cloned()
        }) {
            Some(ext) => vec![ext],
            None => order,
        };

        for ext in candidates {
            let url = build_config_url(&ctx.config().remote, key_prefix, &ext);
            self.synchronize_file(Target::Class(class.clone()), prepare(&ext), url, wait)
                .await;
        }
    }

    /// Fetch the main file, then every registered class.
    pub async fn fetch_all_configurations(self: &Arc<Self>) {
        let ctx = &self.ctx;
        let extension = ctx.main_extension();
        let file = ctx
            .store()
            .check_and_prepare(ctx.folder(), ctx.main_name(), &extension);
        let url = build_config_url(&ctx.config().remote, ctx.main_name(), &extension);
        self.synchronize_file(Target::Main, file, url, None).await;

        for class in ctx.registry().all() {
            self.synchronize_class(&class, None).await;
        }
    }

    pub async fn fetch_all_resource_files(self: &Arc<Self>) {
        let ctx = &self.ctx;
        let remote = &ctx.config().remote;
        for relative in &remote.extra_resource_files {
            let Some(identity) =
                extra_identity(ctx.folder(), relative, &remote.extra_resource_extensions)
            else {
                tracing::info!(path = %relative, "Resource file skipped, extension not permitted");
                continue;
            };
            let file = ctx
                .store()
                .check_and_prepare(&identity.path, &identity.name, &identity.extension);
            let url = build_extra_url(remote, relative);
            self.synchronize_file(Target::Extra(relative.clone()), file, url, None)
                .await;
        }
    }

    /// Wait until nothing is in flight, polling with a growing interval.
    ///
    /// Returns false when `bound` elapsed first.
    pub async fn wait_for_drain(&self, bound: Duration) -> bool {
        let step = (self.ctx.config().remote.web_request_timeout() / 10)
            .max(Duration::from_millis(1));
        let deadline = Instant::now() + bound;
        let mut rounds = 1u32;
        while !self.in_queue.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep((step * rounds).min(deadline - now)).await;
            rounds = rounds.saturating_add(1);
        }
        true
    }

    /// Resolves once every apply action released so far has run.
    pub async fn flush(&self) {
        self.coordinator().flush().await;
    }

    /// Write the synchronized marker when no request is in flight.
    pub fn write_marker_if_idle(&self) -> bool {
        if !self.in_queue.is_empty() {
            return false;
        }
        let path = self.marker_path();
        match marker::write_marker(&path, disk::now_millis()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write synchronization marker");
                false
            }
        }
    }

    pub fn marker_path(&self) -> std::path::PathBuf {
        marker::marker_path(
            self.ctx.folder(),
            self.ctx.main_name(),
            &self.ctx.main_extension(),
        )
    }

    /// Fetch everything, wait for the responses and their apply actions,
    /// then record the synchronization.
    pub async fn load_all(self: &Arc<Self>) {
        self.fetch_all_configurations().await;
        self.fetch_all_resource_files().await;

        let remote = &self.ctx.config().remote;
        let attempts = self.ctx.fetcher().policy().max_attempts + 1;
        if !self.wait_for_drain(remote.web_request_timeout() * attempts).await {
            tracing::warn!(pending = self.pending(), "Remote requests still in flight");
        }
        self.flush().await;
        self.write_marker_if_idle();
        tracing::info!("Finished loading from remote configuration center");
    }
}

/// When `start` waits for the initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Blocking {
    Always,
    /// Unless the marker shows a synchronization within the expiring interval.
    UnlessSynchronized,
}

/// Fetches everything once at start.
pub struct WebOnce {
    loader: Arc<WebLoader>,
    running: AtomicBool,
    blocking: Blocking,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl WebOnce {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self::with_policy(ctx, false, Blocking::Always)
    }

    /// Stage of a hybrid strategy: persists to disk and only blocks when the
    /// local copy is not recently synchronized.
    pub fn hybrid(ctx: Arc<SyncContext>) -> Self {
        Self::with_policy(ctx, true, Blocking::UnlessSynchronized)
    }

    fn with_policy(ctx: Arc<SyncContext>, persist_to_disk: bool, blocking: Blocking) -> Self {
        Self {
            loader: Arc::new(WebLoader::new(ctx, persist_to_disk)),
            running: AtomicBool::new(false),
            blocking,
            background: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &Arc<WebLoader> {
        &self.loader
    }

    fn blocks_at_start(&self) -> bool {
        match self.blocking {
            Blocking::Always => true,
            Blocking::UnlessSynchronized => {
                let expiring = self
                    .loader
                    .context()
                    .config()
                    .remote
                    .synchronized_expiring_interval_ms;
                !marker::is_fresh(&self.loader.marker_path(), expiring, disk::now_millis())
            }
        }
    }
}

#[async_trait]
impl LoadStrategy for WebOnce {
    async fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let loader = self.loader.clone();
        if self.blocks_at_start() {
            loader.load_all().await;
        } else {
            tracing::info!("Local copy recently synchronized, fetching in the background");
            let handle = tokio::spawn(async move { loader.load_all().await });
            *self.background.lock() = Some(handle);
        }
        true
    }

    async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let background = self.background.lock().take();
        if let Some(handle) = background {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background load panicked");
            }
        }
        let bound = self.loader.context().config().remote.web_request_interval() * 3;
        if !self.loader.wait_for_drain(bound).await {
            tracing::warn!(pending = self.loader.pending(), "Stopping with requests in flight");
        }
        self.loader.flush().await;
        self.running.store(false, Ordering::SeqCst);
    }

    async fn add(&self, class: ConfigClass) {
        let ctx = self.loader.context();
        ctx.registry().register(class.clone());
        if !self.is_running() {
            return;
        }
        let loader = self.loader.clone();
        let for_defaults = class.clone();
        run_blocking(move || loader.apply_defaults(&for_defaults)).await;
        let timeout = ctx.config().remote.web_request_timeout();
        self.loader.synchronize_class(&class, Some(timeout)).await;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
