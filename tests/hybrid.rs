//! Hybrid strategies: local copy first, remote content mirrored to disk.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use config_sync::memory::disk;
use config_sync::registry::ConfigClass;
use config_sync::{ConfigTarget, LiveConfig, ParseFlags, ParseOutcome, Schema};
use config_sync::strategy::marker::{marker_path, read_marker, write_marker};
use config_sync::strategy::{HybridOnce, HybridWatcher, LoadStrategy};

mod common;
use common::{Captured, Reply};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_content_is_persisted_with_remote_mtime() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/config.ini" => Reply::ok("db.port=7\n", 1_000_000),
        "/app/db.ini" => Reply::ok("host=remote\n", 2_000_000),
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = common::context(common::settings(dir.path(), Some(&center)));
    let recording = common::Recording::new();

    let strategy = HybridOnce::once(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);

    assert_eq!(recording.last_value("host").as_deref(), Some("remote"));
    assert_eq!(recording.last_value("port").as_deref(), Some("7"));

    let main = dir.path().join("config.ini");
    let class = dir.path().join("db.ini");
    assert_eq!(std::fs::read_to_string(&main).unwrap(), "db.port=7\n");
    assert_eq!(std::fs::read_to_string(&class).unwrap(), "host=remote\n");
    assert_eq!(disk::mtime_millis(&main).unwrap(), Some(1_000_000));
    assert_eq!(disk::mtime_millis(&class).unwrap(), Some(2_000_000));

    let marker = marker_path(dir.path(), "config", ".ini");
    assert!(read_marker(&marker).is_some_and(|ts| ts > 2_000_000));

    strategy.stop().await;
    assert!(!strategy.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fresh_marker_starts_from_disk() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/db.ini" => {
            Reply::ok("host=remote\n", 2_000_000).delayed(Duration::from_millis(500))
        }
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    disk::write_file(&dir.path().join("db.ini"), b"host=local\n", 1_000).unwrap();
    write_marker(&marker_path(dir.path(), "config", ".ini"), disk::now_millis()).unwrap();
    let ctx = common::context(common::settings(dir.path(), Some(&center)));
    let recording = common::Recording::new();

    let strategy = HybridOnce::once(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);
    assert_eq!(recording.last_value("host").as_deref(), Some("local"));

    // Stopping waits for the background fetch.
    strategy.stop().await;
    assert_eq!(recording.last_value("host").as_deref(), Some("remote"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("db.ini")).unwrap(),
        "host=remote\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expired_marker_blocks_start() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/db.ini" => {
            Reply::ok("host=remote\n", 2_000_000).delayed(Duration::from_millis(100))
        }
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    disk::write_file(&dir.path().join("db.ini"), b"host=local\n", 1_000).unwrap();
    write_marker(&marker_path(dir.path(), "config", ".ini"), 0).unwrap();
    let ctx = common::context(common::settings(dir.path(), Some(&center)));
    let recording = common::Recording::new();

    let strategy = HybridOnce::once(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);

    assert_eq!(recording.history("host"), vec!["local", "remote"]);
    strategy.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hybrid_watcher_runs_both_stages() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/db.ini" => Reply::ok("host=remote\n", 2_000_000),
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = common::context(common::settings(dir.path(), Some(&center)));
    let recording = common::Recording::new();

    let strategy = HybridWatcher::watcher(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), recording.clone()))
        .await;
    assert!(strategy.start().await);
    assert!(strategy.file_stage().is_running());
    assert!(strategy.web_stage().is_running());
    assert_eq!(recording.last_value("host").as_deref(), Some("remote"));
    assert!(!strategy.start().await);

    strategy.stop().await;
    assert!(!strategy.file_stage().is_running());
    assert!(!strategy.web_stage().is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_extra_resources_are_mirrored() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/certs/ca.pem" => Reply::ok("-----BEGIN CERTIFICATE-----\n", 3_000_000),
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::settings(dir.path(), Some(&center));
    config.remote.extra_resource_files = vec!["certs/ca.pem".into(), "bin/tool.exe".into()];

    let strategy = HybridOnce::once(common::context(config));
    assert!(strategy.start().await);

    let pem = dir.path().join("certs").join("ca.pem");
    assert_eq!(
        std::fs::read_to_string(&pem).unwrap(),
        "-----BEGIN CERTIFICATE-----\n"
    );
    assert_eq!(disk::mtime_millis(&pem).unwrap(), Some(3_000_000));
    // Extension not permitted: never requested.
    assert!(center.requests_for("/app/bin/tool.exe").is_empty());
    strategy.stop().await;
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Credentials {
    host: String,
    secret: String,
}

/// Live credentials that remember the flags of every update.
struct Counted {
    live: LiveConfig<Credentials>,
    updates: Mutex<Vec<ParseFlags>>,
}

impl ConfigTarget for Counted {
    fn apply(&self, values: &[(String, String)], flags: ParseFlags) -> ParseOutcome {
        if !flags.contains(ParseFlags::CHECK) {
            self.updates.lock().push(flags);
        }
        self.live.apply(values, flags)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mirrored_copy_keeps_local_only_keys() {
    let center = common::start_config_center(|req: &Captured| match req.path.as_str() {
        "/app/db.ini" => Reply::ok("host=remote\nsecret=stolen\n", 2_000_000),
        _ => Reply::status(404),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = common::context(common::settings(dir.path(), Some(&center)));
    let target = Arc::new(Counted {
        live: LiveConfig::new(
            Credentials::default(),
            Schema::new()
                .parsed("host", |c: &mut Credentials, v: String| c.host = v)
                .parsed("secret", |c: &mut Credentials, v: String| c.secret = v)
                .local_only("secret"),
        ),
        updates: Mutex::new(Vec::new()),
    });

    let strategy = HybridWatcher::watcher(ctx);
    strategy
        .add(ConfigClass::new("app.Db", Some("db"), target.clone()))
        .await;
    assert!(strategy.start().await);
    // Let the file stage see the mirrored copy land on disk.
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(dir.path().join("db.ini").exists());
    let current = target.live.load();
    assert_eq!(current.host, "remote");
    assert_eq!(current.secret, "");
    let updates = target.updates.lock().clone();
    assert_eq!(updates.len(), 1, "unexpected updates: {:?}", updates);
    assert!(updates[0].contains(ParseFlags::REMOTE));

    strategy.stop().await;
}
