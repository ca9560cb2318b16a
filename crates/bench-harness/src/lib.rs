//! # Bench Harness
//!
//! Launches benchmark nodes and records their per-batch timings.
//!
//! - `config`: YAML configuration and validation
//! - `credentials`: key pair sources
//! - `command`: per-node launch commands with startup stagger
//! - `stream`: terminator-delimited block reader
//! - `worker`: one node from spawn to termination
//! - `harness`: runs every worker concurrently

pub mod command;
pub mod config;
pub mod credentials;
pub mod harness;
pub mod stream;
pub mod worker;

// Re-export main types
pub use command::{build_commands, node_configs, NodeCommand, NodeConfig, DEFAULT_BASE_STAGGER};
pub use config::{CredentialsConfig, HarnessConfig, HarnessOptions};
pub use credentials::{CredentialStore, EnvCredentials, NodeCredentials, StaticCredentials};
pub use harness::{Harness, HarnessReport};
pub use stream::{BatchStream, StreamEvent};
pub use worker::{NodeOutcome, NodeWorker, Termination, WorkerSettings};
