//! State shared by every strategy of a process.

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::memory::MemoryFileStore;
use crate::parser::ParserFactory;
use crate::registry::ClassRegistry;
use crate::remote::{RemoteFetcher, WebClient};

pub struct SyncContext {
    config: SyncConfig,
    store: Arc<MemoryFileStore>,
    registry: ClassRegistry,
    parsers: Arc<dyn ParserFactory>,
    codecs: CodecRegistry,
    fetcher: Arc<RemoteFetcher>,
    /// May change at runtime when the main file is replaced by another format.
    main_extension: RwLock<String>,
}

impl SyncContext {
    /// Context using the process-wide store and the reqwest client.
    pub fn new(config: SyncConfig, parsers: Arc<dyn ParserFactory>) -> SyncResult<Self> {
        let fetcher = RemoteFetcher::from_config(&config)?;
        Ok(Self::assemble(config, parsers, fetcher))
    }

    /// Context fetching through `client` instead of the reqwest client.
    pub fn with_client(
        config: SyncConfig,
        parsers: Arc<dyn ParserFactory>,
        client: Arc<dyn WebClient>,
    ) -> Self {
        let fetcher = RemoteFetcher::with_client(&config, client);
        Self::assemble(config, parsers, fetcher)
    }

    fn assemble(
        config: SyncConfig,
        parsers: Arc<dyn ParserFactory>,
        fetcher: RemoteFetcher,
    ) -> Self {
        let main_extension = RwLock::new(config.general.main_extension.clone());
        Self {
            config,
            store: MemoryFileStore::global(),
            registry: ClassRegistry::new(),
            parsers,
            codecs: CodecRegistry::with_defaults(),
            fetcher: Arc::new(fetcher),
            main_extension,
        }
    }

    /// Use a private store instead of the process-wide one.
    pub fn with_store(mut self, store: Arc<MemoryFileStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryFileStore> {
        &self.store
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn parsers(&self) -> &dyn ParserFactory {
        self.parsers.as_ref()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn fetcher(&self) -> &Arc<RemoteFetcher> {
        &self.fetcher
    }

    pub fn folder(&self) -> &Path {
        &self.config.general.folder
    }

    pub fn main_name(&self) -> &str {
        &self.config.general.main_name
    }

    pub fn main_extension(&self) -> String {
        self.main_extension.read().clone()
    }

    pub fn set_main_extension(&self, extension: &str) {
        *self.main_extension.write() = extension.to_string();
    }

    pub fn scanning_extensions(&self) -> &[String] {
        &self.config.general.scanning_extensions
    }

    pub fn skip_invalid(&self) -> bool {
        self.config.general.skip_invalid_update
    }

    pub fn multiple_files(&self) -> bool {
        self.config.general.multiple_files
    }

    /// Remote password after codec decoding.
    ///
    /// A value that fails to decode is logged and used as is.
    pub fn decoded_password(&self) -> Option<String> {
        let raw = self.config.remote.auth_password.as_deref()?;
        match self.codecs.decode_value(raw) {
            Ok(password) => Some(password),
            Err(e) => {
                tracing::error!(error = %e, "Failed to decode remote password");
                Some(raw.to_string())
            }
        }
    }
}
