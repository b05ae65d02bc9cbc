//! Local folder loading.
//!
//! # Responsibilities
//! - Load the main file and keep its parser as the default for every class
//! - Load each class's own file, preferring the main extension
//! - Mirror extra resource files into the memory store
//! - Act on classified file system events
//!
//! # Data Flow
//! ```text
//! main file → MemoryFile → default parser → every class
//! <prefix><ext> → MemoryFile → class parser → that class
//! ```
//!
//! # Design Decisions
//! - `file_last_updateds` suppresses reloads of a file whose mtime was
//!   already applied; a failed parse records nothing so the next event retries
//! - Bytes already held in memory are not reparsed on an event, so a mirrored
//!   remote copy is not applied twice; forced loads keep its `REMOTE` flag
//! - All methods do blocking disk IO and run on the blocking pool

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::memory::disk;
use crate::observability::metrics;
use crate::parser::{apply_parser, ConfigParser, ParseFlags, ParseOutcome};
use crate::registry::ConfigClass;
use crate::strategy::context::SyncContext;
use crate::strategy::layout::{extra_identity, find_config_file};
use crate::strategy::{run_blocking, LoadStrategy};
use crate::watch::{decide, Decision, FsEvent, WatchRules};

pub struct FileLoader {
    ctx: Arc<SyncContext>,
    /// File name → mtime of the version last applied.
    file_last_updateds: DashMap<String, i64>,
    key_prefix_class_map: DashMap<String, ConfigClass>,
    main_last_updated: AtomicI64,
    main_from_remote: AtomicBool,
    default_parser: RwLock<Option<Arc<dyn ConfigParser>>>,
}

impl FileLoader {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            ctx,
            file_last_updateds: DashMap::new(),
            key_prefix_class_map: DashMap::new(),
            main_last_updated: AtomicI64::new(0),
            main_from_remote: AtomicBool::new(false),
            default_parser: RwLock::new(None),
        }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    fn default_parser(&self) -> Option<Arc<dyn ConfigParser>> {
        self.default_parser.read().clone()
    }

    /// Mtime of the last applied version of `file_name`.
    pub fn last_applied(&self, file_name: &str) -> Option<i64> {
        self.file_last_updateds.get(file_name).map(|v| *v)
    }

    /// Forget everything applied so a restart reloads every file.
    pub fn reset(&self) {
        self.file_last_updateds.clear();
        self.key_prefix_class_map.clear();
        self.main_last_updated.store(0, Ordering::SeqCst);
    }

    /// Reload the main file when changed, re-apply it to every class, then
    /// reload each class's own file on top of those defaults.
    pub fn update_all_configurations(&self) {
        let ctx = &self.ctx;
        let extension = ctx.main_extension();
        let path = ctx.folder().join(format!("{}{}", ctx.main_name(), extension));
        match disk::mtime_millis(&path) {
            Ok(Some(mtime)) if mtime != self.main_last_updated.load(Ordering::SeqCst) => {
                self.load_main(&extension, mtime)
            }
            Ok(Some(_)) => {}
            Ok(None) => tracing::error!(
                path = %path.display(),
                "Main configuration file does not exist"
            ),
            Err(e) => tracing::error!(
                path = %path.display(),
                error = %e,
                "Failed to stat main configuration file"
            ),
        }

        let default = self.default_parser();
        for class in ctx.registry().all() {
            if let Some(parser) = &default {
                let outcome =
                    apply_parser(parser.as_ref(), &class, self.default_flags(), ctx.skip_invalid());
                if outcome == ParseOutcome::Applied && class.key_prefix().is_none() {
                    ctx.registry().record_extension(class.name(), &extension);
                }
            }
            let Some(key_prefix) = class.key_prefix() else {
                continue;
            };
            self.key_prefix_class_map
                .insert(key_prefix.to_string(), class.clone());
            if !ctx.multiple_files() {
                continue;
            }
            if let Some((_, ext)) =
                find_config_file(ctx.folder(), key_prefix, &extension, ctx.scanning_extensions())
            {
                self.update_single_configuration(key_prefix, &ext, &class, true);
            }
        }
    }

    fn load_main(&self, extension: &str, mtime: i64) {
        let ctx = &self.ctx;
        let file = ctx
            .store()
            .check_and_prepare(ctx.folder(), ctx.main_name(), extension);
        if let Err(e) = file.synchronize_with_local(false) {
            tracing::error!(error = %e, "Failed to read main configuration file");
            return;
        }
        if self.main_last_updated.load(Ordering::SeqCst) > 0 {
            tracing::info!(file = %file.key(), "Main configuration file updated");
        }
        let Some(content) = file.content() else {
            return;
        };
        match ctx.parsers().prepare(extension, &content, true) {
            Ok(parser) => {
                if parser.is_none() {
                    tracing::error!(extension, "No parser for main configuration file extension");
                }
                *self.default_parser.write() = parser;
                self.main_last_updated.store(mtime, Ordering::SeqCst);
                self.main_from_remote
                    .store(file.content_from_remote(), Ordering::SeqCst);
            }
            Err(e) => tracing::error!(
                file = %file.key(),
                error = %e,
                "Failed to parse main configuration file"
            ),
        }
    }

    /// Load `<key_prefix><extension>` into `class`.
    ///
    /// Skipped when that mtime was already applied, unless `force`. Returns
    /// true when the class changed.
    pub fn update_single_configuration(
        &self,
        key_prefix: &str,
        extension: &str,
        class: &ConfigClass,
        force: bool,
    ) -> bool {
        let ctx = &self.ctx;
        let file_name = format!("{}{}", key_prefix, extension);
        let path = ctx.folder().join(&file_name);
        let mtime = match disk::mtime_millis(&path) {
            Ok(Some(mtime)) => mtime,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to stat configuration file"
                );
                return false;
            }
        };
        let last = self.last_applied(&file_name);
        if !force && last == Some(mtime) {
            return false;
        }

        let file = ctx.store().check_and_prepare(ctx.folder(), key_prefix, extension);
        let reconciled = match file.synchronize_with_local(false) {
            Ok(reconciled) => reconciled,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read configuration file");
                return false;
            }
        };
        // Disk holds bytes already in memory, e.g. a mirrored remote copy.
        if !force && !reconciled.content_changed() && (last.is_some() || file.content_from_remote())
        {
            self.file_last_updateds.insert(file_name, file.modified().max(mtime));
            return false;
        }
        if last.is_some() {
            tracing::info!(
                class = %class.name(),
                file = %path.display(),
                "Configuration file updated"
            );
        }
        let Some(content) = file.content() else {
            return false;
        };
        let parser = match ctx.parsers().prepare(extension, &content, false) {
            Ok(Some(parser)) => parser,
            Ok(None) => {
                tracing::warn!(extension, "No parser for configuration file extension");
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "Failed to parse configuration file"
                );
                return false;
            }
        };

        let applied_mtime = disk::mtime_millis(&path).ok().flatten().unwrap_or(mtime);
        self.file_last_updateds.insert(file_name, applied_mtime);
        ctx.registry().record_extension(class.name(), extension);
        let flags = origin_flags(file.content_from_remote());
        apply_parser(parser.as_ref(), class, flags, ctx.skip_invalid()) == ParseOutcome::Applied
    }

    fn default_flags(&self) -> ParseFlags {
        origin_flags(self.main_from_remote.load(Ordering::SeqCst))
    }

    fn apply_defaults(&self, class: &ConfigClass) {
        if let Some(parser) = self.default_parser() {
            apply_parser(
                parser.as_ref(),
                class,
                self.default_flags(),
                self.ctx.skip_invalid(),
            );
        }
    }

    /// Load a class added while running: main file defaults, then its own file.
    pub fn load_class(&self, class: &ConfigClass) {
        self.apply_defaults(class);
        let Some(key_prefix) = class.key_prefix() else {
            return;
        };
        self.key_prefix_class_map
            .insert(key_prefix.to_string(), class.clone());
        if !self.ctx.multiple_files() {
            return;
        }
        let main_extension = self.ctx.main_extension();
        if let Some((path, ext)) = find_config_file(
            self.ctx.folder(),
            key_prefix,
            &main_extension,
            self.ctx.scanning_extensions(),
        ) {
            if self.update_single_configuration(key_prefix, &ext, class, true) {
                tracing::info!(
                    class = %class.name(),
                    file = %path.display(),
                    "Configuration loaded"
                );
            }
        }
    }

    /// Reconcile every extra resource file with the disk.
    pub fn load_resource_files(&self) {
        let remote = &self.ctx.config().remote;
        for relative in &remote.extra_resource_files {
            let Some(identity) =
                extra_identity(self.ctx.folder(), relative, &remote.extra_resource_extensions)
            else {
                tracing::debug!(path = %relative, "Resource file extension not permitted");
                continue;
            };
            let file = self
                .ctx
                .store()
                .check_and_prepare(&identity.path, &identity.name, &identity.extension);
            if let Err(e) = file.synchronize_with_local(false) {
                tracing::warn!(error = %e, "Failed to read resource file");
            }
        }
    }

    /// Classify `event` and act on the decision.
    pub fn handle_event(&self, event: &FsEvent) -> Decision {
        let ctx = &self.ctx;
        let main_extension = ctx.main_extension();
        let rules = WatchRules {
            main_name: ctx.main_name(),
            main_extension: &main_extension,
            scanning_extensions: ctx.scanning_extensions(),
        };
        let decision = decide(
            event,
            &rules,
            |prefix| {
                find_config_file(ctx.folder(), prefix, &main_extension, ctx.scanning_extensions())
                    .map(|(_, ext)| ext)
            },
            |prefix| ctx.multiple_files() && self.key_prefix_class_map.contains_key(prefix),
        );
        metrics::record_fs_event(decision.label());

        match &decision {
            Decision::Ignore => {}
            Decision::Unknown { key_prefix } => {
                tracing::debug!(key_prefix = %key_prefix, "No configuration class for file")
            }
            Decision::Shadowed { touched, active } => tracing::warn!(
                file = %touched,
                active = %active,
                "Updated file is disabled, another extension takes precedence"
            ),
            Decision::Vanished { file_name } => {
                self.file_last_updateds.remove(file_name);
                tracing::warn!(
                    file = %file_name,
                    "Configuration file deleted without replacement, restart may use stale values"
                );
            }
            Decision::Replaced {
                deleted,
                key_prefix,
                extension,
            } => {
                self.file_last_updateds.remove(deleted);
                if let Some(class) = self.class_for(key_prefix) {
                    tracing::info!(
                        from = %deleted,
                        to = %format!("{}{}", key_prefix, extension),
                        "Configuration extension changed"
                    );
                    self.apply_defaults(&class);
                    self.update_single_configuration(key_prefix, extension, &class, true);
                }
            }
            Decision::Reload {
                key_prefix,
                extension,
            } => {
                if let Some(class) = self.class_for(key_prefix) {
                    if let Some(old) = ctx.registry().extension(class.name()) {
                        if &old != extension {
                            tracing::info!(
                                from = %format!("{}{}", key_prefix, old),
                                to = %format!("{}{}", key_prefix, extension),
                                "Configuration extension changed"
                            );
                        }
                    }
                    self.update_single_configuration(key_prefix, extension, &class, false);
                }
            }
            Decision::MainReload { extension, deleted } => {
                if let Some(deleted) = deleted {
                    self.file_last_updateds.remove(deleted);
                }
                if *extension != main_extension {
                    tracing::info!(
                        from = %main_extension,
                        to = %extension,
                        "Main configuration extension changed"
                    );
                    ctx.set_main_extension(extension);
                    self.main_last_updated.store(0, Ordering::SeqCst);
                }
                self.update_all_configurations();
            }
        }
        decision
    }

    fn class_for(&self, key_prefix: &str) -> Option<ConfigClass> {
        self.key_prefix_class_map
            .get(key_prefix)
            .map(|c| c.value().clone())
    }
}

/// Bytes served by the configuration center keep their remote flag when
/// re-applied from the mirrored copy.
fn origin_flags(from_remote: bool) -> ParseFlags {
    if from_remote {
        ParseFlags::UPDATE | ParseFlags::REMOTE
    } else {
        ParseFlags::UPDATE
    }
}

/// Loads the folder once at start.
pub struct FileOnce {
    loader: Arc<FileLoader>,
    running: AtomicBool,
}

impl FileOnce {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            loader: Arc::new(FileLoader::new(ctx)),
            running: AtomicBool::new(false),
        }
    }

    pub fn loader(&self) -> &Arc<FileLoader> {
        &self.loader
    }
}

#[async_trait]
impl LoadStrategy for FileOnce {
    async fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let loader = self.loader.clone();
        run_blocking(move || {
            loader.update_all_configurations();
            loader.load_resource_files();
        })
        .await;
        tracing::info!(
            folder = %self.loader.context().folder().display(),
            "Local configuration loaded"
        );
        true
    }

    async fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.loader.reset();
        }
    }

    async fn add(&self, class: ConfigClass) {
        self.loader.context().registry().register(class.clone());
        if !self.is_running() {
            return;
        }
        let loader = self.loader.clone();
        run_blocking(move || loader.load_class(&class)).await;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
