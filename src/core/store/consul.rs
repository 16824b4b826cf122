//! consul driver (KV HTTP API).
//!
//! Values travel base64 encoded. Revisions are a key's `ModifyIndex`; waits
//! use blocking queries (`?index=N&wait=…`) and re-issue them when the
//! server-side timeout expires without a change.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{http, Driver};
use crate::core::constants;
use crate::core::types::{Entry, Node, Revision};
use crate::error::StoreError;

const INDEX_HEADER: &str = "X-Consul-Index";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvPair {
    #[serde(default)]
    value: Option<String>,
    modify_index: u64,
}

impl KvPair {
    fn into_node(self) -> Result<Node, StoreError> {
        let value = match self.value {
            Some(encoded) => BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| StoreError::InvalidResponse(format!("consul value: {}", e)))?,
            None => Vec::new(),
        };
        Ok(Node::new(value, self.modify_index))
    }
}

/// consul KV store driver.
#[derive(Debug, Clone)]
pub struct Consul {
    client: Client,
    machines: Vec<String>,
}

impl Consul {
    /// Create a driver for the given agent URLs (e.g., `http://127.0.0.1:8500`).
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

    /// consul keys have no leading slash.
    fn path(key: &str) -> &str {
        key.trim_start_matches('/')
    }

    fn url(machine: &str, path: &str) -> String {
        format!("{}/v1/kv/{}", machine, path)
    }

    fn single(pairs: Vec<KvPair>, key: &str) -> Result<Node, StoreError> {
        pairs
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?
            .into_node()
    }

    async fn fetch(
        &self,
        key: &str,
        index: Option<u64>,
    ) -> Result<(Option<Vec<KvPair>>, Option<u64>), StoreError> {
        let path = Self::path(key);
        let response = http::send(&self.machines, |m| {
            let request = self.client.get(Self::url(m, path));
            match index {
                Some(index) => request.query(&[
                    ("index", index.to_string()),
                    ("wait", constants::CONSUL_WAIT.to_string()),
                ]),
                None => request,
            }
        })
        .await?;

        let status = response.status();
        let header = http::index_header(&response, INDEX_HEADER);
        trace!(status = %status, index = ?header, "consul reply");

        if status == StatusCode::NOT_FOUND {
            return Ok((None, header));
        }
        if !status.is_success() {
            return Err(StoreError::Transient(format!("consul returned {}", status)));
        }
        let pairs = response.json::<Vec<KvPair>>().await?;
        Ok((Some(pairs), header))
    }
}

#[async_trait]
impl Driver for Consul {
    fn name(&self) -> &'static str {
        "consul"
    }

    async fn read(&self, key: &str) -> Result<Node, StoreError> {
        match self.fetch(key, None).await? {
            (Some(pairs), _) => Self::single(pairs, key),
            (None, _) => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = Self::path(key);
        let response = http::send(&self.machines, |m| {
            self.client.put(Self::url(m, path)).body(value.to_vec())
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Transient(format!("consul returned {}", status)));
        }
        let accepted = response.text().await?;
        if accepted.trim() != "true" {
            return Err(StoreError::Rejected(format!("consul refused write to {}", key)));
        }
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<Entry>, StoreError> {
        let base = Self::path(key).trim_end_matches('/');
        // The root is listed through the bare `/v1/kv/` path.
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{}/", base)
        };
        let response = http::send(&self.machines, |m| {
            self.client
                .get(Self::url(m, &prefix))
                .query(&[("keys", ""), ("separator", "/")])
        })
        .await?;

        let status = response.status();
        let children = if status == StatusCode::NOT_FOUND {
            Vec::new()
        } else if status.is_success() {
            response.json::<Vec<String>>().await?
        } else {
            return Err(StoreError::Transient(format!("consul returned {}", status)));
        };

        // The folder marker itself (`app/`) is not a child.
        let children: Vec<String> = children
            .into_iter()
            .filter(|c| !c.is_empty() && *c != prefix)
            .collect();

        if children.is_empty() {
            if prefix.is_empty() {
                return Err(StoreError::NotFound(key.to_string()));
            }
            // consul has no directory type: a key holding a value with
            // nothing beneath it is a leaf.
            return match self.read(key).await {
                Ok(_) => Err(StoreError::NotDirectory(key.to_string())),
                Err(e) => Err(e),
            };
        }

        let lead = if key.starts_with('/') { "/" } else { "" };
        Ok(children
            .into_iter()
            .map(|child| match child.strip_suffix('/') {
                Some(dir) => Entry::dir(format!("{}{}", lead, dir)),
                None => Entry::leaf(format!("{}{}", lead, child)),
            })
            .collect())
    }

    async fn wait(
        &self,
        key: &str,
        after: Revision,
        cancel: &CancellationToken,
    ) -> Result<Option<Node>, StoreError> {
        let mut index = after.0;
        loop {
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                reply = self.fetch(key, Some(index)) => reply?,
            };

            match reply {
                (Some(pairs), header) => {
                    let node = Self::single(pairs, key)?;
                    if node.revision > after {
                        return Ok(Some(node));
                    }
                    // Timed out, or another key moved the index.
                    index = header.unwrap_or(index).max(after.0);
                }
                (None, _) => return Err(StoreError::NotFound(key.to_string())),
            }
            trace!(key, index, "consul blocking query returned without change");
        }
    }
}
