//! Configuration management for transitnet.
//!
//! Configuration is driven by environment variables; the CLI overrides
//! individual fields from its flags.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::poll::PollSettings;
use crate::types::Region;

/// Global configuration for transitnet.
///
/// # Examples
///
/// ```
/// use transitnet_core::TransitNetConfig;
///
/// let config = TransitNetConfig::builder().auto_approve(true).build();
/// assert!(config.auto_approve);
/// assert_eq!(config.default_region.as_str(), "us-east-1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TransitNetConfig {
    /// Directory holding one `<scenario>.json` resource store per scenario.
    #[builder(default = PathBuf::from("state"))]
    pub state_dir: PathBuf,

    /// Path of the YAML topology constants.
    #[builder(default = PathBuf::from("config/topology.yaml"))]
    pub topology_file: PathBuf,

    /// Region used for intra-region runs and for records without a region.
    #[builder(default)]
    pub default_region: Region,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Seconds between two polls of an asynchronous state transition.
    #[builder(default = 10)]
    pub poll_interval_secs: u64,

    /// Seconds after which polling gives up.
    #[builder(default = 600)]
    pub poll_timeout_secs: u64,

    /// Endpoint override for EC2/STS (e.g. a local emulator).
    #[builder(default, setter(strip_option))]
    pub endpoint_url: Option<String>,

    /// Continue through every checkpoint without asking.
    #[builder(default = false)]
    pub auto_approve: bool,
}

impl Default for TransitNetConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TransitNetConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STATE_DIR` | `state` |
    /// | `TOPOLOGY_FILE` | `config/topology.yaml` |
    /// | `DEFAULT_REGION`, then `AWS_REGION` | `us-east-1` |
    /// | `LOG_LEVEL` | `info` |
    /// | `POLL_INTERVAL_SECS` | `10` |
    /// | `POLL_TIMEOUT_SECS` | `600` |
    /// | `EC2_ENDPOINT_URL` | *(unset)* |
    /// | `AUTO_APPROVE` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("STATE_DIR") {
            config.state_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TOPOLOGY_FILE") {
            config.topology_file = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DEFAULT_REGION").or_else(|_| env::var("AWS_REGION")) {
            config.default_region = Region::new(v);
        }
        if let Ok(v) = env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        config.poll_interval_secs = env_u64("POLL_INTERVAL_SECS", config.poll_interval_secs);
        config.poll_timeout_secs = env_u64("POLL_TIMEOUT_SECS", config.poll_timeout_secs);
        if let Ok(v) = env::var("EC2_ENDPOINT_URL") {
            if !v.trim().is_empty() {
                config.endpoint_url = Some(v);
            }
        }
        config.auto_approve = env_bool("AUTO_APPROVE", config.auto_approve);

        config
    }

    /// Polling behavior derived from this configuration.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
