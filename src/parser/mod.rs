//! Parser collaborator interface.
//!
//! # Responsibilities
//! - Define how file content reaches a configuration class
//! - Apply the check-before-update policy
//!
//! # Design Decisions
//! - Parsers are prepared once per content version by a factory keyed on
//!   the file extension; unsupported extensions yield no parser
//! - Parsing never panics; malformed content is rejected when preparing

pub mod properties;

use std::ops::BitOr;
use std::sync::Arc;

use crate::error::SyncResult;
use crate::observability::metrics;
use crate::registry::ConfigClass;

/// OR-able parse options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ParseFlags(u8);

impl ParseFlags {
    pub const NONE: ParseFlags = ParseFlags(0);
    /// Apply the parsed values.
    pub const UPDATE: ParseFlags = ParseFlags(1);
    /// Dry run: report what would happen, change nothing.
    pub const CHECK: ParseFlags = ParseFlags(2);
    /// Run whole-configuration validators.
    pub const VALIDATE: ParseFlags = ParseFlags(4);
    /// Values come from the configuration center.
    pub const REMOTE: ParseFlags = ParseFlags(8);

    pub fn contains(self, other: ParseFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for ParseFlags {
    type Output = ParseFlags;

    fn bitor(self, rhs: ParseFlags) -> ParseFlags {
        ParseFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Invalid,
    NoOp,
    Applied,
}

impl ParseOutcome {
    /// `-1`, `0` or `1`.
    pub fn code(self) -> i8 {
        match self {
            ParseOutcome::Invalid => -1,
            ParseOutcome::NoOp => 0,
            ParseOutcome::Applied => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParseOutcome::Invalid => "invalid",
            ParseOutcome::NoOp => "noop",
            ParseOutcome::Applied => "applied",
        }
    }
}

/// Content of one file, ready to be applied to configuration classes.
pub trait ConfigParser: Send + Sync {
    fn parse(&self, class: &ConfigClass, flags: ParseFlags) -> ParseOutcome;
}

/// Builds parsers from raw file content.
pub trait ParserFactory: Send + Sync {
    /// `Ok(None)` when the extension is not supported.
    fn prepare(
        &self,
        extension: &str,
        content: &[u8],
        is_main: bool,
    ) -> SyncResult<Option<Arc<dyn ConfigParser>>>;
}

/// Run `parser` for `class`, dry-running with CHECK first when `skip_invalid`.
pub fn apply_parser(
    parser: &dyn ConfigParser,
    class: &ConfigClass,
    flags: ParseFlags,
    skip_invalid: bool,
) -> ParseOutcome {
    if skip_invalid && parser.parse(class, flags | ParseFlags::CHECK) == ParseOutcome::Invalid {
        tracing::warn!(
            class = %class.name(),
            "Invalid configuration update skipped"
        );
        metrics::record_apply("skipped");
        return ParseOutcome::Invalid;
    }
    let outcome = parser.parse(class, flags);
    metrics::record_apply(outcome.label());
    match outcome {
        ParseOutcome::Applied => tracing::info!(
            class = %class.name(),
            remote = flags.contains(ParseFlags::REMOTE),
            "Configuration applied"
        ),
        ParseOutcome::Invalid => {
            tracing::warn!(class = %class.name(), "Configuration update rejected")
        }
        ParseOutcome::NoOp => {}
    }
    outcome
}
