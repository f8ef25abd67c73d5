//! A four-way prefix trie over the `ACGT` alphabet.
//!
//! Nodes are stored in a flat arena and addressed by index; each node has one child slot per
//! base. A node is *terminal* when a key ends there, in which case it carries that key's value.
//! Walking a query that is longer than any key stops at the deepest node reachable, and that
//! node need not be terminal: the walk may pass through interior nodes belonging to longer keys
//! that diverge later. Callers confirm candidates with [`PrefixTrie::get`], shortening them
//! until a key is found.

use crate::dna::base_index;
use crate::errors::{DemuxError, Result};

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node<V> {
    children: [Option<u32>; 4],
    value: Option<V>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self { children: [None; 4], value: None }
    }
}

/// Prefix trie mapping `ACGT` keys to values.
#[derive(Debug, Clone)]
pub struct PrefixTrie<V> {
    nodes: Vec<Node<V>>,
    keys: usize,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTrie<V> {
    /// Creates an empty trie holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()], keys: 0 }
    }

    /// Number of keys stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys
    }

    /// True when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Number of nodes allocated, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts `key`, returning the value it previously mapped to.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty or contains a base outside `ACGT`.
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        if key.is_empty() {
            return Err(DemuxError::InvalidParameter {
                parameter: "key".to_string(),
                reason: "trie keys must not be empty".to_string(),
            });
        }

        if let Some(&bad) = key.iter().find(|&&b| base_index(b).is_none()) {
            return Err(DemuxError::InvalidParameter {
                parameter: "key".to_string(),
                reason: format!(
                    "'{}' contains non-ACGT base '{}'",
                    String::from_utf8_lossy(key),
                    bad as char
                ),
            });
        }

        let mut node = ROOT;
        for slot in key.iter().filter_map(|&b| base_index(b)) {
            node = match self.nodes[node].children[slot] {
                Some(child) => child as usize,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children[slot] = Some(child as u32);
                    child
                }
            };
        }

        let previous = self.nodes[node].value.replace(value);
        if previous.is_none() {
            self.keys += 1;
        }
        Ok(previous)
    }

    /// Returns the value stored under exactly `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        if key.is_empty() {
            return None;
        }
        let mut node = ROOT;
        for &base in key {
            node = self.nodes[node].children[base_index(base)?]? as usize;
        }
        self.nodes[node].value.as_ref()
    }

    /// Length of the longest path in the trie that spells a prefix of `query`.
    ///
    /// This is the raw candidate: `&query[..n]` exists as a path but is not necessarily a key.
    /// The walk stops at the first base with no child, including any non-`ACGT` base.
    #[must_use]
    pub fn longest_prefix(&self, query: &[u8]) -> usize {
        let mut node = ROOT;
        let mut depth = 0;
        for &base in query {
            let Some(child) = base_index(base).and_then(|slot| self.nodes[node].children[slot])
            else {
                break;
            };
            node = child as usize;
            depth += 1;
        }
        depth
    }
}
