//! Shared utilities for integration testing.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use config_sync::config::SyncConfig;
use config_sync::live::ConfigTarget;
use config_sync::memory::MemoryFileStore;
use config_sync::parser::properties::PropertiesParserFactory;
use config_sync::parser::{ParseFlags, ParseOutcome};
use config_sync::remote::format_http_date;
use config_sync::strategy::SyncContext;

/// One request received by the mock configuration center.
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// How the mock answers a request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        body: String,
        /// Epoch millis sent as `Last-Modified`.
        last_modified: Option<i64>,
        delay: Duration,
    },
    /// Close the connection without answering.
    Drop,
}

impl Reply {
    pub fn ok(body: &str, last_modified: i64) -> Self {
        Reply::Respond {
            status: 200,
            body: body.to_string(),
            last_modified: Some(last_modified),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            body: String::new(),
            last_modified: None,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Reply::Respond {
                status,
                body,
                last_modified,
                ..
            } => Reply::Respond {
                status,
                body,
                last_modified,
                delay: by,
            },
            Reply::Drop => Reply::Drop,
        }
    }
}

/// A programmable configuration center on a raw TCP listener.
pub struct MockCenter {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockCenter {
    /// URL prefix to put in `remote.server_url_prefix`.
    pub fn prefix(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, path: &str) -> Vec<Captured> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        304 => "304 Not Modified",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "500 Internal Server Error",
    }
}

/// Start a mock configuration center answering each request with `handler`.
pub async fn start_config_center<F>(handler: F) -> MockCenter
where
    F: Fn(&Captured) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let path = line.split_whitespace().nth(1).unwrap_or("/").to_string();
                let mut headers = HashMap::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let trimmed = line.trim_end();
                    if trimmed.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = trimmed.split_once(':') {
                        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                    }
                }

                let captured = Captured { path, headers };
                log.lock().push(captured.clone());
                let reply = handler(&captured);

                let mut socket = reader.into_inner();
                match reply {
                    Reply::Drop => {
                        let _ = socket.shutdown().await;
                    }
                    Reply::Respond {
                        status,
                        body,
                        last_modified,
                        delay,
                    } => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        let mut response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            status_text(status),
                            body.len()
                        );
                        if let Some(date) = last_modified.and_then(format_http_date) {
                            response.push_str(&format!("Last-Modified: {}\r\n", date));
                        }
                        response.push_str("\r\n");
                        response.push_str(&body);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                }
            });
        }
    });

    MockCenter { addr, requests }
}

/// One call received by a [`Recording`] target.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub values: Vec<(String, String)>,
    pub flags: ParseFlags,
}

impl Applied {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Target that records every update it receives.
#[derive(Default)]
pub struct Recording {
    calls: Mutex<Vec<Applied>>,
}

impl Recording {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Applied> {
        self.calls.lock().clone()
    }

    /// Last value written for `key`, across all calls.
    pub fn last_value(&self, key: &str) -> Option<String> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| c.value(key).map(str::to_string))
    }

    /// Values of `key` in the order they were applied.
    pub fn history(&self, key: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.value(key).map(str::to_string))
            .collect()
    }
}

impl ConfigTarget for Recording {
    fn apply(&self, values: &[(String, String)], flags: ParseFlags) -> ParseOutcome {
        if flags.contains(ParseFlags::CHECK) {
            return ParseOutcome::Applied;
        }
        self.calls.lock().push(Applied {
            values: values.to_vec(),
            flags,
        });
        ParseOutcome::Applied
    }
}

/// Settings for a test folder, talking to `center` when given.
pub fn settings(folder: &Path, center: Option<&MockCenter>) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.general.folder = folder.to_path_buf();
    config.remote.web_request_timeout_ms = 1000;
    config.remote.web_request_interval_ms = 200;
    config.remote.server_url_prefix = center.map(MockCenter::prefix);
    config
}

/// Context with a private memory store and the properties parser.
pub fn context(config: SyncConfig) -> Arc<SyncContext> {
    let ctx = SyncContext::new(config, Arc::new(PropertiesParserFactory))
        .unwrap()
        .with_store(Arc::new(MemoryFileStore::new()));
    Arc::new(ctx)
}
