//! Per-node launch commands.
//!
//! Node `i` is started as `<binary> <private_key> <public_key> <delay_ms>`
//! where `delay_ms = (i - 1) * base_stagger`. The node sleeps for that delay
//! itself before joining, which staggers cluster startup.

use crate::credentials::{CredentialStore, NodeCredentials};
use bench_common::{BenchError, BenchResult, NodeIndex};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_STAGGER: Duration = Duration::from_millis(5000);

/// Everything needed to launch one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub index: NodeIndex,
    pub credentials: NodeCredentials,
    pub startup_delay_ms: u64,
}

impl NodeConfig {
    pub fn new(index: NodeIndex, credentials: NodeCredentials, base_stagger: Duration) -> Self {
        let stagger_ms = u64::try_from(base_stagger.as_millis()).unwrap_or(u64::MAX);
        Self {
            index,
            credentials,
            startup_delay_ms: index.stagger_slot().saturating_mul(stagger_ms),
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            self.credentials.private_key.clone(),
            self.credentials.public_key.clone(),
            self.startup_delay_ms.to_string(),
        ]
    }
}

/// Executable plus argument vector for one node.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeCommand {
    pub node: NodeIndex,
    pub binary_path: String,
    pub args: Vec<String>,
}

impl NodeCommand {
    pub fn new(node: NodeIndex, binary_path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            node,
            binary_path: binary_path.into(),
            args,
        }
    }

    pub fn from_config(binary_path: impl Into<String>, config: &NodeConfig) -> Self {
        Self::new(config.index, binary_path, config.args())
    }

    /// Appends extra arguments after the standard ones.
    pub fn with_extra_args<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(extra.into_iter().map(Into::into));
        self
    }
}

// Keys stay out of logs.
impl fmt::Debug for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCommand")
            .field("node", &self.node)
            .field("binary_path", &self.binary_path)
            .field("argc", &self.args.len())
            .finish()
    }
}

/// Resolves credentials for nodes `1..=node_count`.
///
/// Every missing credential is collected before failing.
pub fn node_configs(
    node_count: u32,
    base_stagger: Duration,
    credentials: &dyn CredentialStore,
) -> BenchResult<Vec<NodeConfig>> {
    if node_count == 0 {
        return Err(BenchError::configuration("node count must be at least 1"));
    }

    let mut configs = Vec::with_capacity(node_count as usize);
    let mut missing = Vec::new();

    for index in NodeIndex::range(node_count) {
        match credentials.lookup(index) {
            Ok(pair) => configs.push(NodeConfig::new(index, pair, base_stagger)),
            Err(names) => missing.extend(names),
        }
    }

    if !missing.is_empty() {
        return Err(BenchError::configuration(format!(
            "missing node credentials: {}",
            missing.join(", ")
        )));
    }

    Ok(configs)
}

/// Builds the launch command for every node, node 1 first.
pub fn build_commands(
    binary_path: &str,
    node_count: u32,
    base_stagger: Duration,
    credentials: &dyn CredentialStore,
) -> BenchResult<Vec<NodeCommand>> {
    let configs = node_configs(node_count, base_stagger, credentials)?;
    Ok(configs
        .iter()
        .map(|config| NodeCommand::from_config(binary_path, config))
        .collect())
}
