//! `key=value` parser.
//!
//! Accepts `key=value` or `key: value` lines. `#`, `;` and `!` start a
//! comment line and `[section]` headers are skipped. In the main file only
//! `prefix.key` entries belong to a class; in a class's own file keys may be
//! written bare or with the prefix.

use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::parser::{ConfigParser, ParseFlags, ParseOutcome, ParserFactory};
use crate::registry::ConfigClass;

pub const PROPERTIES_EXTENSIONS: &[&str] = &[
    ".ini",
    ".properties",
    ".props",
    ".conf",
    ".cfg",
    ".config",
    ".txt",
];

#[derive(Debug, Clone)]
pub struct PropertiesParser {
    entries: Vec<(String, String)>,
    is_main: bool,
}

impl PropertiesParser {
    pub fn new(content: &str, is_main: bool) -> SyncResult<Self> {
        let mut entries = Vec::new();
        for (n, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty()
                || line.starts_with(['#', ';', '!'])
                || (line.starts_with('[') && line.ends_with(']'))
            {
                continue;
            }
            let Some(idx) = line.find(['=', ':']) else {
                return Err(SyncError::parse(
                    format!("line {}", n + 1),
                    format!("expected key=value, got '{}'", line),
                ));
            };
            let key = line[..idx].trim();
            if key.is_empty() {
                return Err(SyncError::parse(format!("line {}", n + 1), "empty key"));
            }
            entries.push((key.to_string(), line[idx + 1..].trim().to_string()));
        }
        Ok(Self { entries, is_main })
    }

    /// Entries addressed to `class`, with any key prefix stripped.
    pub fn values_for(&self, class: &ConfigClass) -> Vec<(String, String)> {
        let prefix = class.key_prefix().map(|p| format!("{}.", p));
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let stripped = prefix.as_deref().and_then(|p| key.strip_prefix(p));
                let selected = match (stripped, self.is_main, &prefix) {
                    (Some(key), _, _) => Some(key),
                    (None, false, _) => Some(key.as_str()),
                    (None, true, None) => (!key.contains('.')).then_some(key.as_str()),
                    (None, true, Some(_)) => None,
                };
                selected.map(|key| (key.to_string(), value.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigParser for PropertiesParser {
    fn parse(&self, class: &ConfigClass, flags: ParseFlags) -> ParseOutcome {
        let values = self.values_for(class);
        if values.is_empty() {
            return ParseOutcome::NoOp;
        }
        class.target().apply(&values, flags)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesParserFactory;

impl ParserFactory for PropertiesParserFactory {
    fn prepare(
        &self,
        extension: &str,
        content: &[u8],
        is_main: bool,
    ) -> SyncResult<Option<Arc<dyn ConfigParser>>> {
        if !PROPERTIES_EXTENSIONS.contains(&extension) {
            return Ok(None);
        }
        let text = std::str::from_utf8(content)
            .map_err(|e| SyncError::parse(extension, format!("not utf-8: {}", e)))?;
        let parser = PropertiesParser::new(text, is_main)?;
        Ok(Some(Arc::new(parser)))
    }
}
