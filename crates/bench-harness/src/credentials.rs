//! Key pair sources for node processes.

use bench_common::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Private/public key pair handed to one node on its command line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCredentials {
    pub private_key: String,
    pub public_key: String,
}

impl NodeCredentials {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }
}

impl fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Resolves the key pair for a node.
///
/// On failure the store returns the names of every missing value so the
/// caller can report all of them at once.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, node: NodeIndex) -> Result<NodeCredentials, Vec<String>>;
}

/// Reads `<prefix><index>_PRIVATE_KEY` and `<prefix><index>_PUBLIC_KEY`.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    prefix: String,
}

impl EnvCredentials {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn private_key_var(&self, node: NodeIndex) -> String {
        format!("{}{}_PRIVATE_KEY", self.prefix, node)
    }

    pub fn public_key_var(&self, node: NodeIndex) -> String {
        format!("{}{}_PUBLIC_KEY", self.prefix, node)
    }

    fn read(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("NODE")
    }
}

impl CredentialStore for EnvCredentials {
    fn lookup(&self, node: NodeIndex) -> Result<NodeCredentials, Vec<String>> {
        let private_var = self.private_key_var(node);
        let public_var = self.public_key_var(node);

        match (Self::read(&private_var), Self::read(&public_var)) {
            (Some(private_key), Some(public_key)) => Ok(NodeCredentials {
                private_key,
                public_key,
            }),
            (private_key, public_key) => {
                let mut missing = Vec::new();
                if private_key.is_none() {
                    missing.push(private_var);
                }
                if public_key.is_none() {
                    missing.push(public_var);
                }
                Err(missing)
            }
        }
    }
}

/// Key pairs supplied up front, node 1 first.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    nodes: Vec<NodeCredentials>,
}

impl StaticCredentials {
    pub fn new(nodes: Vec<NodeCredentials>) -> Self {
        Self { nodes }
    }
}

impl CredentialStore for StaticCredentials {
    fn lookup(&self, node: NodeIndex) -> Result<NodeCredentials, Vec<String>> {
        let slot = node.stagger_slot() as usize;
        match self.nodes.get(slot) {
            Some(pair) if !pair.private_key.is_empty() && !pair.public_key.is_empty() => {
                Ok(pair.clone())
            }
            _ => Err(vec![
                format!("credentials.nodes[{}].private_key", slot),
                format!("credentials.nodes[{}].public_key", slot),
            ]),
        }
    }
}
