//! Single-owner task driving the [`TaskQueue`].
//!
//! # Data Flow
//! ```text
//! Coordinator handle (clone per producer)
//!     → commands channel → queue task (owns TaskQueue)
//!     → ready actions    → applier task (runs each on the blocking pool, in order)
//! ```

use tokio::sync::{mpsc, oneshot};

use crate::coordinator::queue::{ApplyAction, TaskQueue};

enum Command {
    Enqueue(String),
    Complete {
        key: String,
        action: Option<ApplyAction>,
    },
    Flush(oneshot::Sender<()>),
}

enum Applier {
    Run(ApplyAction),
    Flush(oneshot::Sender<()>),
}

/// Handle to the coordinator tasks. Both tasks exit once every handle is dropped.
#[derive(Clone)]
pub struct Coordinator {
    tx: mpsc::UnboundedSender<Command>,
}

impl Coordinator {
    /// Start the queue and applier tasks on the current runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (apply_tx, apply_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(rx, apply_tx));
        tokio::spawn(run_applier(apply_rx));
        Self { tx }
    }

    /// Register a pending target. Must precede the matching [`complete`](Self::complete).
    pub fn enqueue(&self, key: impl Into<String>) {
        let _ = self.tx.send(Command::Enqueue(key.into()));
    }

    pub fn complete(&self, key: impl Into<String>, action: Option<ApplyAction>) {
        let _ = self.tx.send(Command::Complete {
            key: key.into(),
            action,
        });
    }

    /// Resolves once every action released before this call has run.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_queue(
    mut rx: mpsc::UnboundedReceiver<Command>,
    apply_tx: mpsc::UnboundedSender<Applier>,
) {
    let mut queue = TaskQueue::new();
    while let Some(command) = rx.recv().await {
        match command {
            Command::Enqueue(key) => queue.enqueue(key),
            Command::Complete { key, action } => {
                for action in queue.complete(&key, action) {
                    let _ = apply_tx.send(Applier::Run(action));
                }
            }
            Command::Flush(done) => {
                let _ = apply_tx.send(Applier::Flush(done));
            }
        }
    }
}

async fn run_applier(mut rx: mpsc::UnboundedReceiver<Applier>) {
    while let Some(message) = rx.recv().await {
        match message {
            Applier::Run(action) => {
                if let Err(e) = tokio::task::spawn_blocking(action).await {
                    tracing::error!(error = %e, "Apply action panicked");
                }
            }
            Applier::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
