//! Engine settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SyncConfig (validated, immutable)
//!     → shared via Arc<SyncContext> to every strategy
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; only the main file extension may
//!   change at runtime and it lives in the strategy context, not here
//! - All fields have defaults to allow minimal settings files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GeneralConfig, HttpPoolConfig, LocalFsConfig, ObservabilityConfig, RemoteConfig,
    RetryConfig, SyncConfig,
};
