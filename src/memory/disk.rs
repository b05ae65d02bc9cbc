//! Thin disk helpers with millisecond modification times.

use bytes::Bytes;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn to_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn from_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis.max(0) as u64)
}

/// Modification time of `path`, `None` when the file does not exist.
pub fn mtime_millis(path: &Path) -> io::Result<Option<i64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(to_millis(meta.modified()?))),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read a file with its modification time, `None` when it does not exist.
pub fn read_file(path: &Path) -> io::Result<Option<(Bytes, i64)>> {
    let Some(mtime) = mtime_millis(path)? else {
        return Ok(None);
    };
    match fs::read(path) {
        Ok(data) => Ok(Some((Bytes::from(data), mtime))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set the modification time of an existing file.
pub fn set_mtime(path: &Path, millis: i64) -> io::Result<()> {
    let file = File::options().write(true).open(path)?;
    file.set_modified(from_millis(millis))
}

/// Write `content` to `path`, creating parent folders, and stamp it with `millis`.
pub fn write_file(path: &Path, content: &[u8], millis: i64) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    if millis > 0 {
        set_mtime(path, millis)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_keeps_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.ini");

        write_file(&path, b"k=v", 1_600_000_000_123).unwrap();
        let (bytes, mtime) = read_file(&path).unwrap().unwrap();
        assert_eq!(&bytes[..], b"k=v");
        assert_eq!(mtime, 1_600_000_000_123);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_file(&dir.path().join("nope")).unwrap().is_none());
        assert!(mtime_millis(dir.path()).unwrap().is_none());
    }
}
