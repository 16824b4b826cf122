//! Watch task and its delivery stream.
//!
//! Each watch runs one task that owns the revision cursor:
//!
//! ```text
//! InitialRead ──ok──▶ LongPoll ──ok──▶ LongPoll (cursor advanced)
//!      │                 │
//!     err               err
//!      ▼                 ▼
//!   Backoff ──▶ InitialRead   Backoff ──▶ LongPoll (same cursor)
//! ```
//!
//! Every state also races the cancel token; cancellation ends the task
//! without a final response. Responses go through a channel of capacity one,
//! so a slow consumer throttles polling.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backoff::{Backoff, Delays};
use super::Driver;
use crate::core::types::{Key, Node, Response, Revision};
use crate::error::StoreError;

/// Responses from one watch, in revision order.
///
/// Dropping the stream stops the watch task.
#[derive(Debug)]
pub struct WatchStream {
    rx: mpsc::Receiver<Response>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchStream {
    /// Next response, or `None` once the watch is cancelled.
    pub async fn recv(&mut self) -> Option<Response> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let item = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        };
        // A response buffered before cancellation is never handed out.
        if self.cancel.is_cancelled() {
            return None;
        }
        item
    }

    /// Stop the watch. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the watch task to exit. Returns immediately if it already
    /// has; never returns for a watch that is still running.
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(super) fn spawn(
    driver: Arc<dyn Driver>,
    key: Key,
    cancel: CancellationToken,
    backoff: Backoff,
) -> WatchStream {
    let (tx, rx) = mpsc::channel(1);
    let watcher = Watcher {
        driver,
        key,
        tx,
        cancel: cancel.clone(),
        delays: backoff.delays(),
        cursor: Revision::ZERO,
    };
    let task = tokio::spawn(watcher.run());
    WatchStream {
        rx,
        cancel,
        task: Some(task),
    }
}

struct Watcher {
    driver: Arc<dyn Driver>,
    key: Key,
    tx: mpsc::Sender<Response>,
    cancel: CancellationToken,
    delays: Delays,
    cursor: Revision,
}

impl Watcher {
    async fn run(mut self) {
        debug!(backend = self.driver.name(), key = %self.key, "watch started");

        loop {
            let outcome = if self.cursor.is_set() {
                self.long_poll().await
            } else {
                self.initial_read().await
            };
            let Some(outcome) = outcome else { break };

            match outcome {
                Ok(node) => {
                    self.delays.reset();
                    debug!(key = %self.key, revision = %self.cursor, "watch observed change");
                    if !self.deliver(Ok(node.value)).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        key = %self.key,
                        cursor = %self.cursor,
                        error = %e,
                        "watch request failed"
                    );
                    if !self.deliver(Err(e)).await || !self.pause().await {
                        break;
                    }
                }
            }
        }

        debug!(key = %self.key, cursor = %self.cursor, "watch stopped");
    }

    /// Plain read used while nothing has been observed yet.
    async fn initial_read(&mut self) -> Option<Result<Node, StoreError>> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = self.driver.read(&self.key) => result,
        };
        Some(result.and_then(|node| self.advance(node)))
    }

    async fn long_poll(&mut self) -> Option<Result<Node, StoreError>> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = self.driver.wait(&self.key, self.cursor, &self.cancel) => result,
        };
        match result {
            Ok(None) => None,
            Ok(Some(node)) => Some(self.advance(node)),
            Err(e) => Some(Err(e)),
        }
    }

    /// Move the cursor to `node`'s revision, refusing to stand still or go
    /// backwards.
    fn advance(&mut self, node: Node) -> Result<Node, StoreError> {
        if node.revision <= self.cursor {
            return Err(StoreError::InvalidResponse(format!(
                "revision {} does not advance past {}",
                node.revision, self.cursor
            )));
        }
        self.cursor = node.revision;
        Ok(node)
    }

    /// Hand a response to the consumer. False once the watch should stop.
    async fn deliver(&self, response: Response) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(response) => sent.is_ok(),
        }
    }

    /// Sleep out the backoff delay. False if cancelled meanwhile.
    async fn pause(&mut self) -> bool {
        let delay = self.delays.next_delay();
        debug!(key = %self.key, delay_ms = delay.as_millis() as u64, "watch backing off");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
