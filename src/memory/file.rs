//! Cached representation of one configuration resource.
//!
//! # Responsibilities
//! - Hold the last known bytes of a resource with its modification time
//! - Reconcile that copy against the local disk and the remote center
//! - Cache the MD5 ETag of the current content
//!
//! # Design Decisions
//! - Newest timestamp wins; content is only replaced when bytes differ
//! - All state mutation happens under one per-instance mutex, so two
//!   reconciliations of the same file never interleave

use bytes::Bytes;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::memory::disk;

/// Identity of a resource: folder, name without extension, extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub name: String,
    pub extension: String,
}

impl FileIdentity {
    pub fn new(path: &Path, name: &str, extension: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            extension: extension.to_string(),
        }
    }

    /// `name + extension`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    /// Location of the resource on the local disk.
    pub fn disk_path(&self) -> PathBuf {
        self.path.join(self.file_name())
    }

    /// Store key, `path + name + extension`.
    pub fn key(&self) -> String {
        self.disk_path().to_string_lossy().into_owned()
    }
}

/// Outcome of a reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Nothing changed.
    Unchanged,
    /// The resource does not exist on disk.
    Missing,
    /// Same bytes, timestamp raised (memory or disk side).
    Touched,
    /// New bytes adopted into memory; `first` when the file had no content yet.
    Adopted { first: bool },
    /// Memory content written to disk.
    Saved,
    /// Remote copy older than memory, ignored.
    Stale,
}

impl Reconciled {
    pub fn content_changed(self) -> bool {
        matches!(self, Reconciled::Adopted { .. })
    }
}

#[derive(Debug, Default)]
struct FileState {
    content: Option<Bytes>,
    modified: i64,
    md5_etag: Option<String>,
    local_existed: bool,
    remote_existed: bool,
    /// Current content was adopted from the configuration center.
    from_remote: bool,
}

/// Point-in-time copy of a file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub content: Option<Bytes>,
    pub modified: i64,
    pub size: usize,
    pub local_existed: bool,
    pub remote_existed: bool,
}

/// Quoted hex MD5 of `content`, the form sent in `If-None-Match`.
pub fn md5_etag(content: &[u8]) -> String {
    let digest = Md5::digest(content);
    format!("\"{}\"", hex::encode(digest))
}

#[derive(Debug)]
pub struct MemoryFile {
    identity: FileIdentity,
    state: Mutex<FileState>,
}

impl MemoryFile {
    pub fn new(identity: FileIdentity) -> Self {
        Self {
            identity,
            state: Mutex::new(FileState::default()),
        }
    }

    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    pub fn key(&self) -> String {
        self.identity.key()
    }

    pub fn content(&self) -> Option<Bytes> {
        self.state.lock().content.clone()
    }

    pub fn modified(&self) -> i64 {
        self.state.lock().modified
    }

    pub fn size(&self) -> usize {
        self.state.lock().content.as_ref().map_or(0, |c| c.len())
    }

    pub fn local_existed(&self) -> bool {
        self.state.lock().local_existed
    }

    pub fn remote_existed(&self) -> bool {
        self.state.lock().remote_existed
    }

    /// True while the held bytes are the last ones the center served.
    pub fn content_from_remote(&self) -> bool {
        self.state.lock().from_remote
    }

    pub fn snapshot(&self) -> FileSnapshot {
        let state = self.state.lock();
        FileSnapshot {
            content: state.content.clone(),
            modified: state.modified,
            size: state.content.as_ref().map_or(0, |c| c.len()),
            local_existed: state.local_existed,
            remote_existed: state.remote_existed,
        }
    }

    /// ETag of the current content, computed once per content version.
    pub fn md5_etag(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.md5_etag.is_none() {
            state.md5_etag = state.content.as_deref().map(md5_etag);
        }
        state.md5_etag.clone()
    }

    /// Reconcile memory with the file on disk.
    ///
    /// With `force_saving`, an absent disk file is created from memory.
    pub fn synchronize_with_local(&self, force_saving: bool) -> SyncResult<Reconciled> {
        let path = self.identity.disk_path();
        let mut state = self.state.lock();

        if force_saving && !path.exists() {
            let Some(content) = state.content.clone() else {
                return Ok(Reconciled::Missing);
            };
            disk::write_file(&path, &content, state.modified)
                .map_err(|e| SyncError::fs(&path, e))?;
            state.local_existed = true;
            return Ok(Reconciled::Saved);
        }

        let Some((bytes, mtime)) = disk::read_file(&path).map_err(|e| SyncError::fs(&path, e))?
        else {
            return Ok(Reconciled::Missing);
        };
        state.local_existed = true;

        if state.content.as_ref() == Some(&bytes) {
            if state.modified > mtime {
                disk::set_mtime(&path, state.modified).map_err(|e| SyncError::fs(&path, e))?;
                return Ok(Reconciled::Touched);
            }
            return Ok(Reconciled::Unchanged);
        }

        match state.content.clone() {
            Some(content) if state.modified > mtime => {
                disk::write_file(&path, &content, state.modified)
                    .map_err(|e| SyncError::fs(&path, e))?;
                Ok(Reconciled::Saved)
            }
            current => {
                let first = current.is_none();
                state.content = Some(bytes);
                state.modified = mtime;
                state.md5_etag = None;
                state.from_remote = false;
                Ok(Reconciled::Adopted { first })
            }
        }
    }

    /// Reconcile memory with a response from the configuration center.
    ///
    /// `last_modified <= 0` means the server sent no usable date.
    pub fn synchronize_with_remote(&self, bytes: Option<Bytes>, last_modified: i64) -> Reconciled {
        let Some(bytes) = bytes else {
            return Reconciled::Unchanged;
        };
        let last_modified = if last_modified <= 0 {
            disk::now_millis()
        } else {
            last_modified
        };

        let mut state = self.state.lock();
        state.remote_existed = true;

        let same = state.content.as_ref().map(|current| *current == bytes);
        match same {
            Some(true) => {
                if last_modified > state.modified {
                    state.modified = last_modified;
                    Reconciled::Touched
                } else {
                    Reconciled::Unchanged
                }
            }
            Some(false) if last_modified < state.modified => Reconciled::Stale,
            _ => {
                let first = same.is_none();
                state.content = Some(bytes);
                state.modified = last_modified;
                state.md5_etag = None;
                state.from_remote = true;
                Reconciled::Adopted { first }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_in(dir: &Path) -> MemoryFile {
        MemoryFile::new(FileIdentity::new(dir, "app", ".ini"))
    }

    #[test]
    fn test_identity_key() {
        let id = FileIdentity::new(Path::new("/etc/conf"), "db", ".json");
        assert_eq!(id.file_name(), "db.json");
        assert_eq!(id.key(), "/etc/conf/db.json");
    }

    #[test]
    fn test_first_population_from_remote() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        let outcome = file.synchronize_with_remote(Some(Bytes::from_static(b"x=1")), 1000);
        assert_eq!(outcome, Reconciled::Adopted { first: true });
        let snap = file.snapshot();
        assert_eq!(snap.content.as_deref(), Some(&b"x=1"[..]));
        assert_eq!(snap.modified, 1000);
        assert!(snap.remote_existed);
    }

    #[test]
    fn test_remote_sync_is_idempotent() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        let body = Bytes::from_static(b"x=1");
        file.synchronize_with_remote(Some(body.clone()), 1000);
        assert_eq!(
            file.synchronize_with_remote(Some(body), 1000),
            Reconciled::Unchanged
        );
        assert_eq!(file.modified(), 1000);
    }

    #[test]
    fn test_stale_remote_rejected() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        file.synchronize_with_remote(Some(Bytes::from_static(b"new")), 2000);
        let outcome = file.synchronize_with_remote(Some(Bytes::from_static(b"old")), 1999);
        assert_eq!(outcome, Reconciled::Stale);
        assert_eq!(file.content().as_deref(), Some(&b"new"[..]));
    }

    #[test]
    fn test_equal_bytes_raise_modified() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        file.synchronize_with_remote(Some(Bytes::from_static(b"v")), 1000);
        let outcome = file.synchronize_with_remote(Some(Bytes::from_static(b"v")), 5000);
        assert_eq!(outcome, Reconciled::Touched);
        assert_eq!(file.modified(), 5000);
    }

    #[test]
    fn test_null_bytes_are_noop() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        assert_eq!(file.synchronize_with_remote(None, 1000), Reconciled::Unchanged);
        assert!(!file.remote_existed());
    }

    #[test]
    fn test_etag_cleared_on_new_content() {
        let file = MemoryFile::new(FileIdentity::new(Path::new("/tmp"), "a", ".ini"));
        assert!(file.md5_etag().is_none());
        file.synchronize_with_remote(Some(Bytes::from_static(b"abc")), 1000);
        assert_eq!(
            file.md5_etag().as_deref(),
            Some("\"900150983cd24fb0d6963f7d28e17f72\"")
        );
        file.synchronize_with_remote(Some(Bytes::from_static(b"abcd")), 2000);
        assert_eq!(file.md5_etag(), Some(md5_etag(b"abcd")));
    }

    #[test]
    fn test_local_adopts_disk_content() {
        let dir = tempfile::tempdir().unwrap();
        disk::write_file(&dir.path().join("app.ini"), b"a=1", 10_000).unwrap();
        let file = file_in(dir.path());

        let outcome = file.synchronize_with_local(false).unwrap();
        assert_eq!(outcome, Reconciled::Adopted { first: true });
        assert_eq!(file.modified(), 10_000);
        assert!(file.local_existed());
    }

    #[test]
    fn test_origin_follows_adopted_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(dir.path());
        file.synchronize_with_remote(Some(Bytes::from_static(b"r=1")), 20_000);
        assert!(file.content_from_remote());

        // Mirrored copy on disk is the same bytes.
        file.synchronize_with_local(true).unwrap();
        assert_eq!(file.synchronize_with_local(false).unwrap(), Reconciled::Unchanged);
        assert!(file.content_from_remote());

        disk::write_file(&dir.path().join("app.ini"), b"r=2", 30_000).unwrap();
        assert_eq!(
            file.synchronize_with_local(false).unwrap(),
            Reconciled::Adopted { first: false }
        );
        assert!(!file.content_from_remote());
    }

    #[test]
    fn test_local_missing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(dir.path());
        assert_eq!(file.synchronize_with_local(false).unwrap(), Reconciled::Missing);
        assert!(!file.local_existed());
    }

    #[test]
    fn test_forced_save_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(dir.path());
        file.synchronize_with_remote(Some(Bytes::from_static(b"r=1")), 20_000);

        assert_eq!(file.synchronize_with_local(true).unwrap(), Reconciled::Saved);
        let (bytes, mtime) = disk::read_file(&dir.path().join("app.ini")).unwrap().unwrap();
        assert_eq!(&bytes[..], b"r=1");
        assert_eq!(mtime, 20_000);
        assert!(file.local_existed());
    }

    #[test]
    fn test_newer_memory_overwrites_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        disk::write_file(&path, b"old", 10_000).unwrap();
        let file = file_in(dir.path());
        file.synchronize_with_remote(Some(Bytes::from_static(b"new")), 30_000);

        assert_eq!(file.synchronize_with_local(false).unwrap(), Reconciled::Saved);
        let (bytes, mtime) = disk::read_file(&path).unwrap().unwrap();
        assert_eq!(&bytes[..], b"new");
        assert_eq!(mtime, 30_000);
    }

    #[test]
    fn test_newer_disk_replaces_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        let file = file_in(dir.path());
        file.synchronize_with_remote(Some(Bytes::from_static(b"mem")), 10_000);
        disk::write_file(&path, b"disk", 40_000).unwrap();

        assert_eq!(
            file.synchronize_with_local(false).unwrap(),
            Reconciled::Adopted { first: false }
        );
        assert_eq!(file.content().as_deref(), Some(&b"disk"[..]));
        assert_eq!(file.modified(), 40_000);
    }

    #[test]
    fn test_equal_bytes_raise_disk_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        disk::write_file(&path, b"same", 10_000).unwrap();
        let file = file_in(dir.path());
        file.synchronize_with_remote(Some(Bytes::from_static(b"same")), 50_000);

        assert_eq!(file.synchronize_with_local(false).unwrap(), Reconciled::Touched);
        assert_eq!(disk::mtime_millis(&path).unwrap(), Some(50_000));
    }
}
