//! In-memory key-value store for tests and offline tooling.
//!
//! Reproduces the etcd v2 behaviors the datastore relies on: implicit
//! parent directories, one-level directory listings, `prevValue`
//! preconditions and ordered appends. Clones share the same tree, so a test
//! can hand one clone to the code under test and inspect another.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{Error, code};
use crate::node::{Node, SEPARATOR, normalize_key};
use crate::store::KvStore;

#[derive(Debug, Clone)]
struct Entry {
    // None for a directory.
    value: Option<String>,
    created_index: u64,
    modified_index: u64,
}

#[derive(Debug, Default)]
struct Tree {
    entries: BTreeMap<String, Entry>,
    index: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value currently stored, keyed by absolute key. Directories are
    /// omitted.
    pub async fn dump(&self) -> BTreeMap<String, String> {
        let tree = self.tree.lock().await;
        tree.entries
            .iter()
            .filter_map(|(k, e)| e.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

/// Ancestors of a normalized key, outermost first, excluding the root.
fn ancestors(key: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(off) = key[pos + 1..].find(SEPARATOR) {
        pos += off + 1;
        out.push(key[..pos].to_owned());
    }
    out
}

fn child_prefix(key: &str) -> String {
    if key == "/" {
        key.to_owned()
    } else {
        format!("{key}{SEPARATOR}")
    }
}

impl Tree {
    fn next_index(&mut self) -> u64 {
        self.index += 1;
        self.index
    }

    fn is_dir(&self, key: &str) -> Option<bool> {
        if key == "/" {
            return Some(true);
        }
        self.entries.get(key).map(|e| e.value.is_none())
    }

    fn make_parents(&mut self, key: &str) -> Result<(), Error> {
        for parent in ancestors(key) {
            match self.is_dir(&parent) {
                Some(true) => {}
                Some(false) => return Err(Error::NotADirectory { key: parent }),
                None => {
                    let index = self.next_index();
                    self.entries.insert(
                        parent,
                        Entry {
                            value: None,
                            created_index: index,
                            modified_index: index,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: Option<String>) -> Node {
        let index = self.next_index();
        let entry = self
            .entries
            .entry(key.to_owned())
            .and_modify(|e| {
                e.value.clone_from(&value);
                e.modified_index = index;
            })
            .or_insert(Entry {
                value: value.clone(),
                created_index: index,
                modified_index: index,
            })
            .clone();
        to_node(key, &entry, Vec::new())
    }

    fn children(&self, key: &str) -> Vec<(String, Entry)> {
        let prefix = child_prefix(key);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains(SEPARATOR))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    fn node_at(&self, key: &str, recursive: bool) -> Result<Node, Error> {
        let entry = if key == "/" {
            Entry {
                value: None,
                created_index: 0,
                modified_index: 0,
            }
        } else {
            self.entries
                .get(key)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound {
                    key: key.to_owned(),
                })?
        };
        if entry.value.is_some() {
            return Ok(to_node(key, &entry, Vec::new()));
        }

        let mut nodes = Vec::new();
        for (child_key, child) in self.children(key) {
            if child.value.is_none() && recursive {
                nodes.push(self.node_at(&child_key, true)?);
            } else {
                nodes.push(to_node(&child_key, &child, Vec::new()));
            }
        }
        Ok(to_node(key, &entry, nodes))
    }
}

fn to_node(key: &str, entry: &Entry, nodes: Vec<Node>) -> Node {
    Node {
        key: key.to_owned(),
        value: entry.value.clone(),
        dir: entry.value.is_none(),
        nodes,
        created_index: entry.created_index,
        modified_index: entry.modified_index,
    }
}

impl KvStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Node, Error> {
        let key = normalize_key(key);
        trace!(%key, "memory read");
        self.tree.lock().await.node_at(&key, false)
    }

    async fn read_recursive(&self, key: &str) -> Result<Node, Error> {
        let key = normalize_key(key);
        trace!(%key, "memory recursive read");
        self.tree.lock().await.node_at(&key, true)
    }

    async fn write(&self, key: &str, value: &str) -> Result<Node, Error> {
        let key = normalize_key(key);
        trace!(%key, "memory write");
        let mut tree = self.tree.lock().await;
        if tree.is_dir(&key) == Some(true) {
            return Err(Error::NotAFile { key });
        }
        tree.make_parents(&key)?;
        Ok(tree.set(&key, Some(value.to_owned())))
    }

    async fn write_if_value(&self, key: &str, value: &str, prev_value: &str) -> Result<Node, Error> {
        let key = normalize_key(key);
        trace!(%key, "memory compare-and-swap");
        let mut tree = self.tree.lock().await;
        let current = match tree.entries.get(&key) {
            None => return Err(Error::KeyNotFound { key }),
            Some(Entry { value: None, .. }) => return Err(Error::NotAFile { key }),
            Some(Entry {
                value: Some(current),
                ..
            }) => current.clone(),
        };
        if current != prev_value {
            return Err(Error::CompareFailed {
                key,
                cause: format!("[{prev_value} != {current}]"),
            });
        }
        Ok(tree.set(&key, Some(value.to_owned())))
    }

    async fn mkdir(&self, key: &str) -> Result<Node, Error> {
        let key = normalize_key(key);
        trace!(%key, "memory mkdir");
        let mut tree = self.tree.lock().await;
        // etcd answers a mkdir over an existing directory with "Not a file"
        // and replaces an existing value.
        if tree.is_dir(&key) == Some(true) {
            return Err(Error::NotAFile { key });
        }
        tree.make_parents(&key)?;
        Ok(tree.set(&key, None))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let key = normalize_key(key);
        trace!(%key, "memory delete");
        let mut tree = self.tree.lock().await;
        match tree.is_dir(&key) {
            None => Err(Error::KeyNotFound { key }),
            Some(true) => Err(Error::NotAFile { key }),
            Some(false) => {
                tree.entries.remove(&key);
                tree.next_index();
                Ok(())
            }
        }
    }

    async fn delete_recursive(&self, key: &str) -> Result<(), Error> {
        let key = normalize_key(key);
        trace!(%key, "memory recursive delete");
        if key == "/" {
            return Err(Error::Api {
                code: code::ROOT_READ_ONLY,
                message: "Cannot delete the root directory".into(),
                cause: key,
            });
        }
        let mut tree = self.tree.lock().await;
        if tree.entries.remove(&key).is_none() {
            return Err(Error::KeyNotFound { key });
        }
        let prefix = child_prefix(&key);
        tree.entries.retain(|k, _| !k.starts_with(&prefix));
        tree.next_index();
        Ok(())
    }

    async fn append(&self, dir: &str, value: &str) -> Result<Node, Error> {
        let dir = normalize_key(dir);
        trace!(%dir, "memory append");
        let mut tree = self.tree.lock().await;
        match tree.is_dir(&dir) {
            Some(true) => {}
            Some(false) => return Err(Error::NotADirectory { key: dir }),
            None => {
                tree.make_parents(&dir)?;
                tree.set(&dir, None);
            }
        }
        let key = format!("{}{:020}", child_prefix(&dir), tree.index + 1);
        Ok(tree.set(&key, Some(value.to_owned())))
    }
}
