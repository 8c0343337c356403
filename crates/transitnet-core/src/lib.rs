//! Core building blocks for transitnet.
//!
//! transitnet provisions a two-VPC topology joined by AWS Transit Gateways,
//! either inside one region or across two regions. This crate holds
//! everything that does not talk to AWS directly:
//!
//! - [`ResourceStore`]: the per-scenario JSON file mapping logical resource
//!   names to provider-assigned IDs.
//! - [`TopologyFile`]: the YAML constants describing CIDRs and names.
//! - [`NetworkApi`]: the provider seam implemented by `transitnet-ec2`.
//! - [`Provisioner`] and the [`scenario`] runners: the ordered provisioning
//!   steps with checkpoints between phases.
//! - [`Teardown`]: dependency-ordered deletion of everything recorded.

mod cancel;
mod checkpoint;
mod config;
mod error;
mod poll;
mod provider;
mod provision;
pub mod scenario;
mod state;
mod teardown;
mod topology;
mod types;

#[cfg(test)]
mod fake;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use checkpoint::{AutoApprove, Checkpoint, LineCheckpoint, parse_answer};
pub use config::TransitNetConfig;
pub use error::{
    ProviderError, ProviderResult, StateError, StateResult, TransitNetError, TransitNetResult,
};
pub use poll::{PollSettings, wait_for_created, wait_for_state};
pub use provider::{
    IngressRule, InstanceSpec, NetworkApi, PeeringRequest, RouteTarget, TransitGatewayStatus,
};
pub use provision::{InstancePlan, Provisioner};
pub use scenario::{Outcome, Phase, Scenario};
pub use state::{ResourceRecord, ResourceStore};
pub use teardown::{PlannedDeletion, Teardown, TeardownReport, plan_teardown};
pub use topology::{InterRegionTopology, IntraRegionTopology, NetworkLayout, TopologyFile};
pub use types::{Region, ResourceKind};
