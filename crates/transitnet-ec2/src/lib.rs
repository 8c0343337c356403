//! AWS SDK implementation of [`transitnet_core::NetworkApi`].
//!
//! [`AwsNetwork`] keeps one EC2 and one STS client per region, built from a
//! shared [`aws_config::SdkConfig`]. An endpoint override points every client
//! at a local emulator instead of AWS.
//!
//! ```text
//! Provisioner / Teardown (transitnet-core)
//!        |
//!        v
//!   AwsNetwork (NetworkApi impl)
//!        |
//!        v
//!   RegionalClients (per-region aws-sdk-ec2 / aws-sdk-sts clients)
//! ```

mod client;
pub mod error;
mod network;

pub use client::RegionalClients;
pub use error::classify_error_code;
pub use network::AwsNetwork;
