//! Configuration folder watcher.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::LocalFsConfig;
use crate::watch::classify::{FsEvent, FsEventKind};

/// Watches one folder (non-recursive) and forwards file level events.
pub struct FileSystemWatcher {
    folder: PathBuf,
    /// Poll at this interval instead of using OS notifications.
    polling: Option<Duration>,
}

/// Translate a notify event into per-file events.
fn translate(event: &Event) -> Vec<FsEvent> {
    let kinds: Vec<FsEventKind> = match &event.kind {
        EventKind::Create(_) => vec![FsEventKind::Created],
        EventKind::Remove(_) => vec![FsEventKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![FsEventKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![FsEventKind::Created],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![FsEventKind::Deleted, FsEventKind::Created]
        }
        EventKind::Modify(_) | EventKind::Any => vec![FsEventKind::Modified],
        EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .enumerate()
        .filter_map(|(i, path)| {
            let kind = *kinds.get(i).or_else(|| kinds.last())?;
            let name = path.file_name()?.to_str()?;
            Some(FsEvent::new(name, kind))
        })
        .collect()
}

impl FileSystemWatcher {
    pub fn new(folder: &Path, local_fs: &LocalFsConfig) -> Self {
        Self {
            folder: folder.to_path_buf(),
            polling: (!local_fs.enable_file_watcher).then(|| local_fs.polling_interval()),
        }
    }

    /// Start watching.
    ///
    /// Returns the watcher, which must be kept alive for events to flow, and
    /// a receiver of file events.
    pub fn run(
        self,
    ) -> Result<(Box<dyn Watcher + Send>, mpsc::UnboundedReceiver<FsEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(&event) {
                    let _ = tx.send(fs_event);
                }
            }
            Err(e) => tracing::error!(error = %e, "Watch error"),
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.polling {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        };
        watcher.watch(&self.folder, RecursiveMode::NonRecursive)?;

        tracing::info!(
            folder = ?self.folder,
            polling = self.polling.is_some(),
            "Configuration folder watcher started"
        );
        Ok((watcher, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    #[test]
    fn test_translate_create_and_remove() {
        let create =
            Event::new(EventKind::Create(CreateKind::File)).add_path("/conf/db.ini".into());
        assert_eq!(
            translate(&create),
            vec![FsEvent::new("db.ini", FsEventKind::Created)]
        );

        let remove =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path("/conf/db.ini".into());
        assert_eq!(
            translate(&remove),
            vec![FsEvent::new("db.ini", FsEventKind::Deleted)]
        );
    }

    #[test]
    fn test_translate_rename_both() {
        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/conf/db.ini".into())
            .add_path("/conf/db.js".into());
        assert_eq!(
            translate(&rename),
            vec![
                FsEvent::new("db.ini", FsEventKind::Deleted),
                FsEvent::new("db.js", FsEventKind::Created),
            ]
        );
    }

    #[tokio::test]
    async fn test_polling_watcher_reports_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let local_fs = LocalFsConfig {
            enable_file_watcher: false,
            polling_interval_secs: 1,
        };
        let (_watcher, mut rx) = FileSystemWatcher::new(dir.path(), &local_fs).run().unwrap();
        std::fs::write(dir.path().join("db.ini"), "a=1").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.file_name, "db.ini");
    }
}
