//! etcd driver (v2 keys API).
//!
//! Reads report the cluster index from `X-Etcd-Index`; waits long-poll with
//! `?wait=true&waitIndex=N` and report the changed node's `modifiedIndex`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{http, Driver};
use crate::core::types::{Entry, Node, Revision};
use crate::error::StoreError;

const INDEX_HEADER: &str = "X-Etcd-Index";

const KEY_NOT_FOUND: u32 = 100;
const NOT_A_FILE: u32 = 102;
const NOT_A_DIRECTORY: u32 = 104;
const EVENT_INDEX_CLEARED: u32 = 401;

/// Consecutive bodyless long-poll replies tolerated before a wait fails.
const MAX_EMPTY_REPLIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdNode {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
    #[serde(default)]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdError {
    error_code: u32,
    #[serde(default)]
    message: String,
}

impl EtcdError {
    fn into_store_error(self, key: &str) -> StoreError {
        match self.error_code {
            KEY_NOT_FOUND => StoreError::NotFound(key.to_string()),
            NOT_A_DIRECTORY => StoreError::NotDirectory(key.to_string()),
            NOT_A_FILE => StoreError::Rejected(format!("{}: {}", key, self.message)),
            code => StoreError::Transient(format!("etcd error {}: {}", code, self.message)),
        }
    }
}

enum Reply {
    Body { body: EtcdResponse, index: Option<u64> },
    /// Success status with no body; etcd does this when a wait times out.
    Empty,
    Error(EtcdError),
}

/// etcd v2 store driver.
#[derive(Debug, Clone)]
pub struct Etcd {
    client: Client,
    machines: Vec<String>,
}

impl Etcd {
    /// Create a driver for the given client URLs (e.g., `http://127.0.0.1:4001`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transient` if no machines are given.
    pub fn new(machines: Vec<String>) -> Result<Self, StoreError> {
        Ok(Self {
            client: http::client()?,
            machines: http::machines(machines)?,
        })
    }

    fn url(machine: &str, key: &str) -> String {
        format!("{}/v2/keys/{}", machine, key.trim_start_matches('/'))
    }

    async fn call<F>(&self, build: F) -> Result<Reply, StoreError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder + Send,
    {
        let response = http::send(&self.machines, build).await?;
        let status = response.status();
        let index = http::index_header(&response, INDEX_HEADER);
        let bytes = response.bytes().await?;
        trace!(status = %status, len = bytes.len(), "etcd reply");

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Reply::Empty);
            }
            let body = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::InvalidResponse(format!("etcd: {}", e)))?;
            return Ok(Reply::Body { body, index });
        }

        match serde_json::from_slice::<EtcdError>(&bytes) {
            Ok(error) => Ok(Reply::Error(error)),
            Err(_) if status == reqwest::StatusCode::NOT_FOUND => Ok(Reply::Error(EtcdError {
                error_code: KEY_NOT_FOUND,
                message: "Key not found".to_string(),
            })),
            Err(_) => Err(StoreError::Transient(format!("etcd returned {}", status))),
        }
    }

    async fn get(&self, key: &str) -> Result<(EtcdNode, Option<u64>), StoreError> {
        match self.call(|m| self.client.get(Self::url(m, key))).await? {
            Reply::Body { body, index } => Ok((body.node, index)),
            Reply::Empty => Err(StoreError::InvalidResponse("etcd: empty reply".to_string())),
            Reply::Error(e) => Err(e.into_store_error(key)),
        }
    }
}

#[async_trait]
impl Driver for Etcd {
    fn name(&self) -> &'static str {
        "etcd"
    }

    async fn read(&self, key: &str) -> Result<Node, StoreError> {
        let (node, index) = self.get(key).await?;
        if node.dir {
            return Err(StoreError::InvalidResponse(format!("{} is a directory", key)));
        }
        let revision = index.unwrap_or(node.modified_index);
        Ok(Node::new(node.value.unwrap_or_default(), revision))
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let text = std::str::from_utf8(value)
            .map_err(|_| StoreError::Rejected("etcd only stores UTF-8 text".to_string()))?;
        let reply = self
            .call(|m| self.client.put(Self::url(m, key)).form(&[("value", text)]))
            .await?;
        match reply {
            Reply::Body { .. } | Reply::Empty => Ok(()),
            Reply::Error(e) => Err(e.into_store_error(key)),
        }
    }

    async fn list(&self, key: &str) -> Result<Vec<Entry>, StoreError> {
        let (node, _) = self.get(key).await?;
        if !node.dir {
            return Err(StoreError::NotDirectory(key.to_string()));
        }
        Ok(node
            .nodes
            .into_iter()
            .map(|child| Entry {
                key: child.key,
                dir: child.dir,
            })
            .collect())
    }

    /// Deletions and expiries come back as an empty value at the new index.
    async fn wait(
        &self,
        key: &str,
        after: Revision,
        cancel: &CancellationToken,
    ) -> Result<Option<Node>, StoreError> {
        let wait_index = after.next().to_string();
        let mut empty = 0;
        loop {
            let request = self.call(|m| {
                self.client
                    .get(Self::url(m, key))
                    .query(&[("wait", "true"), ("waitIndex", wait_index.as_str())])
            });
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                reply = request => reply?,
            };

            match reply {
                Reply::Body { body, .. } => {
                    let node = body.node;
                    return Ok(Some(Node::new(
                        node.value.unwrap_or_default(),
                        node.modified_index,
                    )));
                }
                Reply::Empty => {
                    empty += 1;
                    if empty >= MAX_EMPTY_REPLIES {
                        return Err(StoreError::InvalidResponse(format!(
                            "etcd: {} empty replies waiting on {}",
                            empty, key
                        )));
                    }
                    trace!(key, empty, "etcd wait returned empty, polling again");
                }
                Reply::Error(e) if e.error_code == EVENT_INDEX_CLEARED => {
                    // History no longer reaches the cursor; resume from the
                    // current value instead.
                    debug!(key, after = %after, "etcd event index cleared");
                    let node = self.read(key).await?;
                    if node.revision > after {
                        return Ok(Some(node));
                    }
                    return Err(StoreError::InvalidResponse(format!(
                        "etcd index {} cleared but current index is {}",
                        after, node.revision
                    )));
                }
                Reply::Error(e) => return Err(e.into_store_error(key)),
            }
        }
    }
}
