//! In-process store driver.
//!
//! Keeps a revisioned key tree in memory with etcd-like semantics: a single
//! store-wide revision counter, directories implied by key paths, and a
//! bounded per-key history so waits observe every revision in order. Used
//! by tests and by embedders that want the full contract without a network.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Driver;
use crate::core::types::{Entry, Node, Revision};
use crate::error::StoreError;

/// Revisions kept per key for waits that fall behind.
const HISTORY: usize = 1000;

#[derive(Debug, Default)]
struct Tree {
    revision: u64,
    keys: BTreeMap<String, VecDeque<Node>>,
    offline: bool,
}

impl Tree {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Transient("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn is_dir(&self, key: &str) -> bool {
        let prefix = dir_prefix(key);
        self.keys
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Revision {
        self.revision += 1;
        let revision = Revision(self.revision);
        let history = self.keys.entry(key.to_string()).or_default();
        history.push_back(Node { value, revision });
        if history.len() > HISTORY {
            history.pop_front();
        }
        revision
    }
}

/// In-memory store driver.
#[derive(Debug)]
pub struct Memory {
    tree: Mutex<Tree>,
    head: watch::Sender<u64>,
}

impl Memory {
    pub fn new() -> Self {
        let (head, _) = watch::channel(0);
        Self {
            tree: Mutex::new(Tree::default()),
            head,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value directly, bypassing the driver contract.
    pub fn insert(&self, key: &str, value: impl Into<Vec<u8>>) -> Revision {
        let revision = self.lock().put(key, value.into());
        self.head.send_replace(revision.0);
        revision
    }

    /// Raw bytes currently stored at `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .keys
            .get(key)
            .and_then(|history| history.back())
            .map(|node| node.value.clone())
    }

    /// Simulate an outage: while offline every operation fails with
    /// `StoreError::Transient`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
        // Wake waiters so they notice the state change.
        self.head.send_modify(|_| {});
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_prefix(key: &str) -> String {
    format!("{}/", key.trim_end_matches('/'))
}

#[async_trait]
impl Driver for Memory {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &str) -> Result<Node, StoreError> {
        let tree = self.lock();
        tree.check_online()?;
        let history = tree
            .keys
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let latest = history
            .back()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(Node {
            value: latest.value.clone(),
            revision: Revision(tree.revision),
        })
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let revision = {
            let mut tree = self.lock();
            tree.check_online()?;
            if tree.is_dir(key) {
                return Err(StoreError::Rejected(format!("{} is a directory", key)));
            }
            tree.put(key, value.to_vec())
        };
        self.head.send_replace(revision.0);
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<Entry>, StoreError> {
        let tree = self.lock();
        tree.check_online()?;
        if tree.keys.contains_key(key) {
            return Err(StoreError::NotDirectory(key.to_string()));
        }

        let prefix = dir_prefix(key);
        let mut leaves = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        for k in tree
            .keys
            .range(prefix.clone()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(&prefix))
        {
            let rest = &k[prefix.len()..];
            match rest.split_once('/') {
                Some((child, _)) => {
                    dirs.insert(format!("{}{}", prefix, child));
                }
                None => {
                    leaves.insert(k.clone());
                }
            }
        }

        if leaves.is_empty() && dirs.is_empty() {
            return Err(StoreError::NotFound(key.to_string()));
        }

        Ok(leaves
            .into_iter()
            .map(Entry::leaf)
            .chain(dirs.into_iter().map(Entry::dir))
            .collect())
    }

    async fn wait(
        &self,
        key: &str,
        after: Revision,
        cancel: &CancellationToken,
    ) -> Result<Option<Node>, StoreError> {
        // Subscribe before looking so a write in between still wakes us.
        let mut head = self.head.subscribe();
        loop {
            {
                let tree = self.lock();
                tree.check_online()?;
                let next = tree
                    .keys
                    .get(key)
                    .and_then(|history| history.iter().find(|node| node.revision > after));
                if let Some(node) = next {
                    return Ok(Some(node.clone()));
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                changed = head.changed() => {
                    if changed.is_err() {
                        return Err(StoreError::Transient("memory store closed".to_string()));
                    }
                }
            }
        }
    }
}
