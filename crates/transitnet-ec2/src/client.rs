//! Per-region SDK clients.

use std::collections::HashMap;

use aws_config::{BehaviorVersion, SdkConfig};
use parking_lot::Mutex;
use tracing::debug;
use transitnet_core::{Region, TransitNetConfig};

/// Lazily built EC2 and STS clients, one pair per region.
pub struct RegionalClients {
    sdk: SdkConfig,
    endpoint_url: Option<String>,
    ec2: Mutex<HashMap<Region, aws_sdk_ec2::Client>>,
    sts: Mutex<HashMap<Region, aws_sdk_sts::Client>>,
}

impl std::fmt::Debug for RegionalClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionalClients")
            .field("endpoint_url", &self.endpoint_url)
            .field("regions", &self.ec2.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RegionalClients {
    /// Create clients from a loaded SDK configuration. `endpoint_url`
    /// overrides the service endpoint of every client.
    #[must_use]
    pub fn new(sdk: SdkConfig, endpoint_url: Option<String>) -> Self {
        Self {
            sdk,
            endpoint_url,
            ec2: Mutex::new(HashMap::new()),
            sts: Mutex::new(HashMap::new()),
        }
    }

    /// Load the SDK configuration from the environment (credentials chain,
    /// profile) and apply transitnet's region and endpoint settings.
    pub async fn from_config(config: &TransitNetConfig) -> Self {
        let sdk = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(
                config.default_region.as_str().to_owned(),
            ))
            .load()
            .await;
        Self::new(sdk, config.endpoint_url.clone())
    }

    /// EC2 client for `region`.
    pub fn ec2(&self, region: &Region) -> aws_sdk_ec2::Client {
        self.ec2
            .lock()
            .entry(region.clone())
            .or_insert_with(|| {
                debug!(%region, endpoint = ?self.endpoint_url, "creating EC2 client");
                let mut builder = aws_sdk_ec2::config::Builder::from(&self.sdk)
                    .region(aws_sdk_ec2::config::Region::new(region.as_str().to_owned()));
                if let Some(url) = &self.endpoint_url {
                    builder = builder.endpoint_url(url);
                }
                aws_sdk_ec2::Client::from_conf(builder.build())
            })
            .clone()
    }

    /// STS client for `region`.
    pub fn sts(&self, region: &Region) -> aws_sdk_sts::Client {
        self.sts
            .lock()
            .entry(region.clone())
            .or_insert_with(|| {
                debug!(%region, endpoint = ?self.endpoint_url, "creating STS client");
                let mut builder = aws_sdk_sts::config::Builder::from(&self.sdk)
                    .region(aws_sdk_sts::config::Region::new(region.as_str().to_owned()));
                if let Some(url) = &self.endpoint_url {
                    builder = builder.endpoint_url(url);
                }
                aws_sdk_sts::Client::from_conf(builder.build())
            })
            .clone()
    }
}
