//! Scenario runners.
//!
//! A scenario is an ordered list of provisioning steps split into three
//! phases. After each phase the operator [`Checkpoint`] decides whether to go
//! on; stopping leaves everything created so far recorded in the store so a
//! later run resumes, or `cleanup` tears it down. A cancelled run stops the
//! same way, between two steps or at a checkpoint.
//!
//! [`Checkpoint`]: crate::Checkpoint

pub mod inter_region;
pub mod intra_region;

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::cancel::CancelSignal;
use crate::checkpoint::Checkpoint;
use crate::error::{TransitNetError, TransitNetResult};

/// Which topology to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Two VPCs in one region joined by one transit gateway.
    IntraRegion,
    /// Two VPCs in two regions joined by two peered transit gateways.
    InterRegion,
}

impl Scenario {
    /// Every scenario.
    pub const ALL: [Self; 2] = [Self::IntraRegion, Self::InterRegion];

    /// Name of the scenario's state file (without extension) and topology
    /// section.
    #[must_use]
    pub fn state_name(self) -> &'static str {
        match self {
            Self::IntraRegion => "intra_region",
            Self::InterRegion => "inter_region",
        }
    }

    /// Command-line name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntraRegion => "intra-region",
            Self::InterRegion => "inter-region",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intra-region" | "intra_region" | "intra" => Ok(Self::IntraRegion),
            "inter-region" | "inter_region" | "inter" => Ok(Self::InterRegion),
            other => Err(format!(
                "unknown scenario '{other}', expected intra-region or inter-region"
            )),
        }
    }
}

/// Provisioning phase, each followed by a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// VPCs, subnets, internet gateway, routes and route tables.
    Network,
    /// Transit gateways, attachments, peering and their routes.
    Transit,
    /// Security groups and instances.
    Instances,
}

impl Phase {
    /// Prompt shown once the phase is done.
    #[must_use]
    pub fn checkpoint_message(self) -> &'static str {
        match self {
            Self::Network => "Created VPCs, subnets, IG, Routes, and Routing tables. Continue?",
            Self::Transit => "Created Transit Gateways, attachments and routes. Continue?",
            Self::Instances => "Created EC2 and routes. Go ahead and test it out",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Transit => "transit",
            Self::Instances => "instances",
        };
        f.write_str(name)
    }
}

/// How a scenario run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every phase ran.
    Completed,
    /// The operator stopped at the checkpoint after `after`.
    Stopped {
        /// Last phase that ran.
        after: Phase,
    },
    /// The run was cancelled between two steps of `during`, or at its
    /// checkpoint.
    Interrupted {
        /// Phase that was running.
        during: Phase,
    },
}

/// Ask the checkpoint after `phase`; `Some(outcome)` means stop here.
///
/// A cancellation while waiting for the answer abandons the question.
pub(crate) async fn checkpoint(
    checkpoint: &dyn Checkpoint,
    cancel: &CancelSignal,
    phase: Phase,
) -> TransitNetResult<Option<Outcome>> {
    if cancel.is_cancelled() {
        return Ok(Some(Outcome::Interrupted { during: phase }));
    }
    let proceed = tokio::select! {
        answer = checkpoint.proceed(phase.checkpoint_message()) => answer?,
        () = cancel.cancelled() => {
            info!(%phase, "interrupted at checkpoint");
            return Ok(Some(Outcome::Interrupted { during: phase }));
        }
    };
    if proceed {
        Ok(None)
    } else {
        info!(%phase, "stopped at checkpoint");
        Ok(Some(Outcome::Stopped { after: phase }))
    }
}

/// Turn a cancelled phase into [`Outcome::Interrupted`]; `Some(outcome)`
/// means stop here.
pub(crate) fn interrupted_in(
    phase: Phase,
    result: TransitNetResult<()>,
) -> TransitNetResult<Option<Outcome>> {
    match result {
        Ok(()) => Ok(None),
        Err(TransitNetError::Interrupted) => {
            info!(%phase, "interrupted between steps");
            Ok(Some(Outcome::Interrupted { during: phase }))
        }
        Err(e) => Err(e),
    }
}
