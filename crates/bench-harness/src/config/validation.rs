use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &HarnessConfig) -> Result<()> {
    validate_harness_options(&config.harness)?;
    validate_credentials(&config.credentials, config.harness.node_count)?;
    Ok(())
}

/// Validate run parameters
fn validate_harness_options(options: &HarnessOptions) -> Result<()> {
    if options.node_count == 0 {
        return Err(anyhow!("node_count must be at least 1"));
    }

    if options.node_binary.trim().is_empty() {
        return Err(anyhow!("node_binary cannot be empty"));
    }

    if options.read_timeout.is_zero() {
        return Err(anyhow!("read_timeout must be greater than 0"));
    }

    if options.results_dir.as_os_str().is_empty() {
        return Err(anyhow!("results_dir cannot be empty"));
    }

    validate_log_level(&options.log_level)
}

pub fn validate_log_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

fn validate_credentials(credentials: &CredentialsConfig, node_count: u32) -> Result<()> {
    match credentials {
        CredentialsConfig::Env { prefix } => {
            if prefix.is_empty() {
                return Err(anyhow!("Credential environment prefix cannot be empty"));
            }
        }
        CredentialsConfig::Inline { nodes } => {
            if nodes.len() < node_count as usize {
                return Err(anyhow!(
                    "Inline credentials list {} key pairs but node_count is {}",
                    nodes.len(),
                    node_count
                ));
            }
        }
    }
    Ok(())
}
