//! Integration tests for transitnet against an EC2-compatible endpoint.
//!
//! These tests require an emulator (or a sandbox account) reachable at
//! `EC2_ENDPOINT_URL`, defaulting to `localhost:4566`. They are marked
//! `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p transitnet-integration -- --ignored
//! ```

use std::sync::Once;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use transitnet_core::{PollSettings, ResourceStore};
use transitnet_ec2::{AwsNetwork, RegionalClients};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL of the emulator.
fn endpoint_url() -> String {
    std::env::var("EC2_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Shared SDK configuration with static test credentials.
fn sdk_config() -> SdkConfig {
    let creds = Credentials::new("test", "test", None, None, "integration-test");

    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(SharedCredentialsProvider::new(creds))
        .build()
}

/// Network provider pointing at the emulator.
#[must_use]
pub fn network() -> AwsNetwork {
    init_tracing();
    AwsNetwork::new(RegionalClients::new(sdk_config(), Some(endpoint_url())))
}

/// Raw EC2 client pointing at the emulator, for assertions.
#[must_use]
pub fn ec2_client() -> aws_sdk_ec2::Client {
    init_tracing();
    let config = aws_sdk_ec2::config::Builder::from(&sdk_config())
        .endpoint_url(endpoint_url())
        .build();
    aws_sdk_ec2::Client::from_conf(config)
}

/// Polling tuned for an emulator: short interval, generous deadline.
#[must_use]
pub fn poll_settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(500),
        timeout: Duration::from_secs(120),
    }
}

/// Generate a unique logical name for a test resource.
#[must_use]
pub fn test_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("{prefix}_{id}")
}

/// Open a store for `scenario` in a fresh temporary directory. Keep the
/// returned directory alive for the duration of the test.
#[must_use]
pub fn temp_store(scenario: &str) -> (tempfile::TempDir, ResourceStore) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create temp dir: {e}"));
    let store = ResourceStore::open(dir.path(), scenario)
        .unwrap_or_else(|e| panic!("failed to open store: {e}"));
    (dir, store)
}

mod test_provider;
mod test_scenario;
