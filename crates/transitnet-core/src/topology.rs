//! Topology constants.
//!
//! The topology file is YAML with one section per scenario. Keys are the
//! upper-case constant names used as logical resource names in the
//! [`crate::ResourceStore`]:
//!
//! ```yaml
//! intra_region:
//!   VPC1: vpc1
//!   IP_CIDR1: 10.1.0.0/16
//!   SUBNET1_VPC1: subnet1_vpc1
//!   ...
//! inter_region:
//!   REGION1: us-east-1
//!   REGION2: us-west-1
//!   ...
//! ```

use std::collections::HashSet;
use std::path::Path;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::{TransitNetError, TransitNetResult};
use crate::types::Region;

/// Image used by the intra-region scenario when none is configured.
pub const DEFAULT_IMAGE: &str = "ami-065bb5126e4504910";
/// Instance type used when none is configured.
pub const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";
/// Key pair attached to region-1 instances when none is configured.
pub const DEFAULT_KEY_PAIR: &str = "defaultvpc_instance1";

fn default_image() -> String {
    DEFAULT_IMAGE.to_owned()
}

fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_key_pair() -> Option<String> {
    Some(DEFAULT_KEY_PAIR.to_owned())
}

/// Names and address plan shared by both scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NetworkLayout {
    /// CIDR of VPC 1.
    pub ip_cidr1: String,
    /// CIDR of VPC 2.
    pub ip_cidr2: String,
    /// Logical name of VPC 1.
    pub vpc1: String,
    /// Logical name of VPC 2.
    pub vpc2: String,

    /// CIDR of the public subnet in VPC 1.
    pub subnet_cidr11: String,
    /// CIDR of the private subnet in VPC 1.
    pub subnet_cidr12: String,
    /// CIDR of the private subnet in VPC 2.
    pub subnet_cidr21: String,
    /// Logical name of the public subnet in VPC 1.
    pub subnet1_vpc1: String,
    /// Logical name of the private subnet in VPC 1.
    pub subnet2_vpc1: String,
    /// Logical name of the private subnet in VPC 2.
    pub subnet1_vpc2: String,

    /// Logical name of the internet gateway attached to VPC 1.
    pub igw: String,
    /// Logical name for the main route table of VPC 1 (public).
    pub vpc1_pub_route_table: String,
    /// Logical name for the private route table of VPC 1.
    pub vpc1_pri_route_table: String,
    /// Logical name for the main route table of VPC 2 (private).
    pub vpc2_pri_route_table: String,

    /// Logical name of the VPC 1 transit gateway attachment.
    pub tgw_attach_vpc1: String,
    /// Logical name of the VPC 2 transit gateway attachment.
    pub tgw_attach_vpc2: String,

    /// Logical name of the public instance in VPC 1.
    pub ec2_pub_1_vpc1: String,
    /// Logical name of the private instance in VPC 1.
    pub ec2_pri_2_vpc1: String,
    /// Logical name of the private instance in VPC 2.
    pub ec2_pri_1_vpc2: String,
    /// Security group of the public instance in VPC 1.
    pub sg_pub_1_vpc1: String,
    /// Security group of the private instance in VPC 1.
    pub sg_pri_2_vpc1: String,
    /// Security group of the private instance in VPC 2.
    pub sg_pri_1_vpc2: String,

    /// Instance type for every instance.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// Key pair for instances in the first region.
    #[serde(default = "default_key_pair")]
    pub key_pair: Option<String>,
}

impl NetworkLayout {
    /// Logical names contributed by the shared layout.
    fn names(&self) -> Vec<&str> {
        vec![
            self.vpc1.as_str(),
            self.vpc2.as_str(),
            self.subnet1_vpc1.as_str(),
            self.subnet2_vpc1.as_str(),
            self.subnet1_vpc2.as_str(),
            self.igw.as_str(),
            self.vpc1_pub_route_table.as_str(),
            self.vpc1_pri_route_table.as_str(),
            self.vpc2_pri_route_table.as_str(),
            self.tgw_attach_vpc1.as_str(),
            self.tgw_attach_vpc2.as_str(),
            self.ec2_pub_1_vpc1.as_str(),
            self.ec2_pri_2_vpc1.as_str(),
            self.ec2_pri_1_vpc2.as_str(),
            self.sg_pub_1_vpc1.as_str(),
            self.sg_pri_2_vpc1.as_str(),
            self.sg_pri_1_vpc2.as_str(),
        ]
    }

    /// Check the address plan: aligned CIDRs, disjoint VPCs, subnets inside
    /// their VPC.
    pub fn validate_addresses(&self) -> TransitNetResult<()> {
        let vpc1 = parse_cidr("IP_CIDR1", &self.ip_cidr1)?;
        let vpc2 = parse_cidr("IP_CIDR2", &self.ip_cidr2)?;

        if vpc1.contains(&vpc2.network()) || vpc2.contains(&vpc1.network()) {
            return Err(TransitNetError::Topology(format!(
                "VPC CIDRs {vpc1} and {vpc2} overlap; transit gateway routing needs disjoint ranges"
            )));
        }

        for (key, cidr, parent) in [
            ("SUBNET_CIDR11", &self.subnet_cidr11, vpc1),
            ("SUBNET_CIDR12", &self.subnet_cidr12, vpc1),
            ("SUBNET_CIDR21", &self.subnet_cidr21, vpc2),
        ] {
            let subnet = parse_cidr(key, cidr)?;
            if !parent.contains(&subnet) {
                return Err(TransitNetError::Topology(format!(
                    "{key} {subnet} is not inside its VPC range {parent}"
                )));
            }
        }

        let s11 = parse_cidr("SUBNET_CIDR11", &self.subnet_cidr11)?;
        let s12 = parse_cidr("SUBNET_CIDR12", &self.subnet_cidr12)?;
        if s11.contains(&s12.network()) || s12.contains(&s11.network()) {
            return Err(TransitNetError::Topology(format!(
                "subnets {s11} and {s12} of VPC 1 overlap"
            )));
        }

        Ok(())
    }
}

/// Constants of the intra-region scenario: one region, one transit gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct IntraRegionTopology {
    /// Shared names and address plan.
    #[serde(flatten)]
    pub layout: NetworkLayout,
    /// Logical name of the transit gateway.
    pub tgw: String,
    /// Region to provision in; the configured default region when absent.
    #[serde(default)]
    pub region: Option<Region>,
    /// Availability zone for VPC 1 subnets.
    #[serde(default)]
    pub region1_az: Option<String>,
    /// Availability zone for VPC 2 subnets.
    #[serde(default)]
    pub region2_az: Option<String>,
    /// AMI for every instance.
    #[serde(default = "default_image")]
    pub image: String,
}

impl IntraRegionTopology {
    /// Validate names and the address plan.
    pub fn validate(&self) -> TransitNetResult<()> {
        self.layout.validate_addresses()?;
        let mut names = self.layout.names();
        names.push(self.tgw.as_str());
        ensure_unique(&names)
    }
}

/// Constants of the inter-region scenario: two regions, two peered
/// transit gateways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct InterRegionTopology {
    /// Shared names and address plan.
    #[serde(flatten)]
    pub layout: NetworkLayout,
    /// Region hosting VPC 1.
    pub region1: Region,
    /// Region hosting VPC 2.
    pub region2: Region,
    /// Availability zone for VPC 1 subnets.
    #[serde(default)]
    pub region1_az: Option<String>,
    /// Availability zone for VPC 2 subnets.
    #[serde(default)]
    pub region2_az: Option<String>,
    /// Logical name of the region 1 transit gateway.
    pub tgw_1: String,
    /// Logical name of the region 2 transit gateway.
    pub tgw_2: String,
    /// Logical name of the peering attachment between the two gateways.
    pub tgw_peer_connect: String,
    /// Logical name for the default route table of the region 1 gateway.
    pub tgw_1_route_table: String,
    /// Logical name for the default route table of the region 2 gateway.
    pub tgw_2_route_table: String,
    /// AMI for region 1 instances.
    #[serde(rename = "US_EAST_1_IMAGE", alias = "REGION1_IMAGE")]
    pub region1_image: String,
    /// AMI for region 2 instances.
    #[serde(rename = "US_WEST_1_IMAGE", alias = "REGION2_IMAGE")]
    pub region2_image: String,
    /// Key pair for region 2 instances (key pairs are regional).
    #[serde(default)]
    pub key_pair_region2: Option<String>,
}

impl InterRegionTopology {
    /// Validate names, regions and the address plan.
    pub fn validate(&self) -> TransitNetResult<()> {
        if self.region1 == self.region2 {
            return Err(TransitNetError::Topology(format!(
                "REGION1 and REGION2 are both {}; use the intra-region scenario instead",
                self.region1
            )));
        }
        self.layout.validate_addresses()?;
        let mut names = self.layout.names();
        names.extend([
            self.tgw_1.as_str(),
            self.tgw_2.as_str(),
            self.tgw_peer_connect.as_str(),
            self.tgw_1_route_table.as_str(),
            self.tgw_2_route_table.as_str(),
        ]);
        ensure_unique(&names)
    }
}

/// The whole topology file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyFile {
    /// Intra-region section.
    #[serde(default)]
    pub intra_region: Option<IntraRegionTopology>,
    /// Inter-region section.
    #[serde(default)]
    pub inter_region: Option<InterRegionTopology>,
}

impl TopologyFile {
    /// Read and parse the topology file at `path`.
    pub fn load(path: impl AsRef<Path>) -> TransitNetResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TransitNetError::Topology(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|e| TransitNetError::Topology(format!("{}: {e}", path.display())))
    }

    /// Parse topology YAML.
    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// The intra-region section, validated.
    pub fn intra_region(&self) -> TransitNetResult<&IntraRegionTopology> {
        let section = self.intra_region.as_ref().ok_or_else(|| {
            TransitNetError::Topology("missing `intra_region` section".to_owned())
        })?;
        section.validate()?;
        Ok(section)
    }

    /// The inter-region section, validated.
    pub fn inter_region(&self) -> TransitNetResult<&InterRegionTopology> {
        let section = self.inter_region.as_ref().ok_or_else(|| {
            TransitNetError::Topology("missing `inter_region` section".to_owned())
        })?;
        section.validate()?;
        Ok(section)
    }

    /// Validate every section present.
    pub fn validate(&self) -> TransitNetResult<()> {
        if self.intra_region.is_none() && self.inter_region.is_none() {
            return Err(TransitNetError::Topology(
                "no scenario sections defined".to_owned(),
            ));
        }
        if let Some(section) = &self.intra_region {
            section.validate()?;
        }
        if let Some(section) = &self.inter_region {
            section.validate()?;
        }
        Ok(())
    }
}

fn parse_cidr(key: &str, raw: &str) -> TransitNetResult<Ipv4Net> {
    let net: Ipv4Net = raw
        .parse()
        .map_err(|e| TransitNetError::Topology(format!("{key} '{raw}' is not a CIDR: {e}")))?;
    if net.addr() != net.network() {
        return Err(TransitNetError::Topology(format!(
            "{key} '{raw}' has host bits set (network is {})",
            net.trunc()
        )));
    }
    Ok(net)
}

fn ensure_unique(names: &[&str]) -> TransitNetResult<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(*name) {
            return Err(TransitNetError::Topology(format!(
                "logical name '{name}' is used for more than one resource"
            )));
        }
    }
    Ok(())
}
