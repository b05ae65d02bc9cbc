//! File strategies against a temporary configuration folder.

use std::sync::Arc;
use std::time::Duration;

use config_sync::memory::disk;
use config_sync::registry::ConfigClass;
use config_sync::strategy::{FileOnce, FileWatcher, LoadStrategy};

mod common;

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    check()
}

#[tokio::test]
async fn test_file_once_layers_class_over_main() {
    let dir = tempfile::tempdir().unwrap();
    let main = b"db.host=main\ndb.port=5432\n";
    disk::write_file(&dir.path().join("config.ini"), main, 1_000).unwrap();
    disk::write_file(&dir.path().join("db.ini"), b"host=local\n", 1_000).unwrap();
    let ctx = common::context(common::settings(dir.path(), None));
    let recording = common::Recording::new();

    let strategy = FileOnce::new(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(recording.calls().is_empty());

    assert!(strategy.start().await);
    assert_eq!(recording.history("host"), vec!["main", "local"]);
    assert_eq!(recording.last_value("port").as_deref(), Some("5432"));
    assert!(!strategy.start().await);

    strategy.stop().await;
    assert!(!strategy.is_running());
}

#[tokio::test]
async fn test_add_while_running_loads_class() {
    let dir = tempfile::tempdir().unwrap();
    disk::write_file(&dir.path().join("config.ini"), b"cache.size=16\n", 1_000).unwrap();
    disk::write_file(&dir.path().join("cache.properties"), b"size=64\n", 1_000).unwrap();
    let ctx = common::context(common::settings(dir.path(), None));
    let recording = common::Recording::new();

    let strategy = FileOnce::new(ctx.clone());
    assert!(strategy.start().await);
    strategy
        .add(ConfigClass::new("app.Cache", Some("cache"), recording.clone()))
        .await;

    assert_eq!(recording.history("size"), vec!["16", "64"]);
    assert_eq!(
        ctx.registry().extension("app.Cache").as_deref(),
        Some(".properties")
    );
    strategy.stop().await;
}

#[tokio::test]
async fn test_flat_mode_ignores_class_files() {
    let dir = tempfile::tempdir().unwrap();
    disk::write_file(&dir.path().join("config.ini"), b"db.host=main\n", 1_000).unwrap();
    disk::write_file(&dir.path().join("db.ini"), b"host=local\n", 1_000).unwrap();
    let mut config = common::settings(dir.path(), None);
    config.general.multiple_files = false;
    let recording = common::Recording::new();

    let strategy = FileOnce::new(common::context(config));
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);

    assert_eq!(recording.history("host"), vec!["main"]);
    strategy.stop().await;
}

#[tokio::test]
async fn test_missing_folder_still_starts() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = common::context(common::settings(&dir.path().join("absent"), None));
    let recording = common::Recording::new();

    let strategy = FileOnce::new(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);
    assert!(recording.calls().is_empty());
    strategy.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_reloads_modified_class_file() {
    let dir = tempfile::tempdir().unwrap();
    let class_file = dir.path().join("db.ini");
    disk::write_file(&dir.path().join("config.ini"), b"db.port=5432\n", 1_000).unwrap();
    disk::write_file(&class_file, b"host=a\n", 1_000).unwrap();
    let ctx = common::context(common::settings(dir.path(), None));
    let recording = common::Recording::new();

    let strategy = Arc::new(FileWatcher::new(ctx));
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);
    assert_eq!(recording.last_value("host").as_deref(), Some("a"));

    disk::write_file(&class_file, b"host=b\n", 5_000).unwrap();
    assert!(eventually(|| recording.last_value("host").as_deref() == Some("b")).await);
    // The write and the mtime update may arrive as separate events.
    assert!(eventually(|| strategy.loader().last_applied("db.ini") == Some(5_000)).await);

    strategy.stop().await;
    assert!(!strategy.is_running());

    let applied = recording.calls().len();
    disk::write_file(&class_file, b"host=c\n", 9_000).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recording.calls().len(), applied);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_picks_up_new_main_file() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = common::context(common::settings(dir.path(), None));
    let recording = common::Recording::new();

    let strategy = FileWatcher::new(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);
    assert!(recording.calls().is_empty());

    disk::write_file(&dir.path().join("config.ini"), b"db.host=late\n", 3_000).unwrap();
    assert!(eventually(|| recording.last_value("host").as_deref() == Some("late")).await);

    strategy.stop().await;
}
