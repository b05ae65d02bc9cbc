//! `<main file>.timestamp` marker recording the last complete remote sync.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

pub fn marker_path(folder: &Path, main_name: &str, main_extension: &str) -> PathBuf {
    folder.join(format!("{}{}.timestamp", main_name, main_extension))
}

/// Record `now` (epoch millis) as the last synchronization time.
pub fn write_marker(path: &Path, now: i64) -> SyncResult<()> {
    fs::write(path, now.to_string()).map_err(|e| SyncError::fs(path, e))
}

/// Last synchronization time, `None` when missing or unreadable.
pub fn read_marker(path: &Path) -> Option<i64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether the marker exists and is younger than `expiring_ms`.
pub fn is_fresh(path: &Path, expiring_ms: u64, now: i64) -> bool {
    read_marker(path).is_some_and(|ts| now.saturating_sub(ts) < expiring_ms as i64)
}
