//! Submission-ordered apply queue.
//!
//! Target keys are `class ":" extension`. A completion runs its action only
//! once every key submitted before it has completed; completions that arrive
//! early are parked until the head of the queue catches up.

use std::collections::{HashMap, VecDeque};

/// Work produced by a completed fetch or read, typically a parser call.
pub type ApplyAction = Box<dyn FnOnce() + Send + 'static>;

/// Class part of a target key (everything before the first `:`).
pub fn class_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(class, _)| class)
}

/// Build the target key for a class identifier and extension.
pub fn target_key(class: &str, extension: &str) -> String {
    format!("{}:{}", class, extension)
}

#[derive(Default)]
pub struct TaskQueue {
    queue: VecDeque<String>,
    ready: HashMap<String, ApplyAction>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, key: impl Into<String>) {
        self.queue.push_back(key.into());
    }

    /// Number of keys still waiting to be applied or discarded.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Record the completion of `key` and return the actions that may now
    /// run, in order.
    pub fn complete(&mut self, key: &str, action: Option<ApplyAction>) -> Vec<ApplyAction> {
        let mut runnable = Vec::new();

        if self.queue.front().map(String::as_str) != Some(key) {
            match action {
                Some(action) if self.queue.iter().any(|k| k == key) => {
                    self.ready.insert(key.to_string(), action);
                }
                // Already coalesced away.
                Some(_) => {}
                None => {
                    if let Some(pos) = self.queue.iter().position(|k| k == key) {
                        self.queue.remove(pos);
                    }
                }
            }
            return runnable;
        }

        self.queue.pop_front();
        let succeeded = action.is_some();
        runnable.extend(action);

        let class = class_of(key);
        while let Some(head) = self.queue.front() {
            if let Some(parked) = self.ready.remove(head) {
                self.queue.pop_front();
                runnable.push(parked);
                continue;
            }
            if succeeded && head != key && class_of(head) == class {
                tracing::debug!(key = %head, winner = %key, "Discarding redundant format probe");
                self.queue.pop_front();
                continue;
            }
            break;
        }
        runnable
    }
}
