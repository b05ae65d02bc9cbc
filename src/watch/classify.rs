//! What to do about one file system event.
//!
//! The classifier is pure: existence checks and class lookups are supplied
//! by the caller, so every branch can be exercised without touching disk.

/// Kind of change reported for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
}

/// A change to a file directly inside the configuration folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub file_name: String,
    pub kind: FsEventKind,
}

impl FsEvent {
    pub fn new(file_name: impl Into<String>, kind: FsEventKind) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not a configuration file.
    Ignore,
    /// No registered class for this key prefix.
    Unknown { key_prefix: String },
    /// Another extension of the same key prefix takes precedence.
    Shadowed { touched: String, active: String },
    /// The active file is gone and nothing replaces it.
    Vanished { file_name: String },
    /// The active file was deleted; another extension now takes over.
    Replaced {
        deleted: String,
        key_prefix: String,
        extension: String,
    },
    /// The active file of a class changed.
    Reload { key_prefix: String, extension: String },
    /// The main configuration file changed, possibly to another extension.
    MainReload {
        extension: String,
        deleted: Option<String>,
    },
}

impl Decision {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Ignore => "ignore",
            Decision::Unknown { .. } => "unknown",
            Decision::Shadowed { .. } => "shadowed",
            Decision::Vanished { .. } => "vanished",
            Decision::Replaced { .. } => "replaced",
            Decision::Reload { .. } => "reload",
            Decision::MainReload { .. } => "main_reload",
        }
    }
}

/// Folder conventions needed to classify an event.
#[derive(Debug, Clone, Copy)]
pub struct WatchRules<'a> {
    pub main_name: &'a str,
    pub main_extension: &'a str,
    pub scanning_extensions: &'a [String],
}

/// Split `name.ext` at the last dot, keeping the dot on the extension.
pub fn split_extension(file_name: &str) -> Option<(&str, &str)> {
    let idx = file_name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some((&file_name[..idx], &file_name[idx..]))
}

/// Classify `event`.
///
/// `active_extension(prefix)` returns the extension of the file currently
/// in effect for `prefix`, after the event. `registered(prefix)` tells
/// whether a class uses that prefix.
pub fn decide(
    event: &FsEvent,
    rules: &WatchRules<'_>,
    active_extension: impl Fn(&str) -> Option<String>,
    registered: impl Fn(&str) -> bool,
) -> Decision {
    let Some((key_prefix, extension)) = split_extension(&event.file_name) else {
        return Decision::Ignore;
    };
    let scanned = extension == rules.main_extension
        || rules.scanning_extensions.iter().any(|e| e == extension);
    if !scanned {
        return Decision::Ignore;
    }

    let is_main = key_prefix == rules.main_name;
    if !is_main && !registered(key_prefix) {
        return Decision::Unknown {
            key_prefix: key_prefix.to_string(),
        };
    }

    let Some(active) = active_extension(key_prefix) else {
        return Decision::Vanished {
            file_name: event.file_name.clone(),
        };
    };

    if event.kind == FsEventKind::Deleted {
        let deleted = Some(event.file_name.clone()).filter(|_| active != extension);
        return match (is_main, deleted) {
            (true, deleted) => Decision::MainReload {
                extension: active,
                deleted,
            },
            (false, Some(deleted)) => Decision::Replaced {
                deleted,
                key_prefix: key_prefix.to_string(),
                extension: active,
            },
            (false, None) => Decision::Reload {
                key_prefix: key_prefix.to_string(),
                extension: active,
            },
        };
    }

    if active != extension {
        return Decision::Shadowed {
            touched: event.file_name.clone(),
            active: format!("{}{}", key_prefix, active),
        };
    }

    if is_main {
        Decision::MainReload {
            extension: active,
            deleted: None,
        }
    } else {
        Decision::Reload {
            key_prefix: key_prefix.to_string(),
            extension: active,
        }
    }
}
