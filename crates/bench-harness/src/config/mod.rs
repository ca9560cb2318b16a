use crate::credentials::{CredentialStore, EnvCredentials, NodeCredentials, StaticCredentials};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub harness: HarnessOptions,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessOptions {
    /// Node executable, started once per node
    #[serde(default = "default_node_binary")]
    pub node_binary: String,

    #[serde(default = "default_node_count")]
    pub node_count: u32,

    /// Directory holding `node<index>.txt` result logs
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Startup delay added per node index
    #[serde(default = "default_base_stagger", with = "duration_serde")]
    pub base_stagger: Duration,

    /// Upper bound for reading one batch from a node
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Time a node gets to exit after SIGTERM before it is killed
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            node_binary: default_node_binary(),
            node_count: default_node_count(),
            results_dir: default_results_dir(),
            base_stagger: default_base_stagger(),
            read_timeout: default_read_timeout(),
            shutdown_grace: default_shutdown_grace(),
            log_level: default_log_level(),
        }
    }
}

/// Where node key pairs come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// `<prefix><index>_PRIVATE_KEY` / `<prefix><index>_PUBLIC_KEY`
    Env {
        #[serde(default = "default_env_prefix")]
        prefix: String,
    },
    /// Key pairs listed in node order
    Inline {
        #[serde(default)]
        nodes: Vec<NodeCredentials>,
    },
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self::Env {
            prefix: default_env_prefix(),
        }
    }
}

impl CredentialsConfig {
    pub fn store(&self) -> Box<dyn CredentialStore> {
        match self {
            Self::Env { prefix } => Box::new(EnvCredentials::new(prefix.clone())),
            Self::Inline { nodes } => Box::new(StaticCredentials::new(nodes.clone())),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: HarnessConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

// Default value functions
fn default_node_binary() -> String {
    "./target/debug/hyperloop_relaynode".to_string()
}

fn default_node_count() -> u32 {
    9
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./test_results")
}

fn default_base_stagger() -> Duration {
    crate::command::DEFAULT_BASE_STAGGER
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(1200)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_env_prefix() -> String {
    "NODE".to_string()
}

/// Durations written as `250ms`, `30s` or `2m`.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", millis / 1000))
        } else {
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // "ms" before "s"
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
