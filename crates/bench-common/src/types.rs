//! Core domain types used throughout the harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based index of a benchmark node.
///
/// The index names the node's credentials, its startup stagger slot and its
/// result file (`node<index>.txt`).
///
/// ```
/// use bench_common::NodeIndex;
///
/// let node = NodeIndex::new(3);
/// assert_eq!(node.get(), 3);
/// assert_eq!(node.stagger_slot(), 2);
/// assert_eq!(node.log_file_name(), "node3.txt");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Creates a node index. Zero is clamped to 1.
    pub fn new(index: u32) -> Self {
        Self(index.max(1))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Zero-based position used for the startup stagger.
    pub fn stagger_slot(&self) -> u64 {
        u64::from(self.0 - 1)
    }

    /// File name of this node's result log.
    pub fn log_file_name(&self) -> String {
        format!("node{}.txt", self.0)
    }

    /// Iterates `1..=count`.
    pub fn range(count: u32) -> impl Iterator<Item = NodeIndex> {
        (1..=count).map(NodeIndex)
    }
}

impl From<u32> for NodeIndex {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
