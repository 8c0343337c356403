//! Region and resource-kind definitions shared across crates.

use std::fmt;

/// AWS region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Region(String);

impl Region {
    /// Region used when nothing else is configured.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a recorded resource.
///
/// Variants are declared in teardown order: a resource may only be deleted
/// once every resource of an earlier kind is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// EC2 instance (`i-`).
    Instance,
    /// Transit gateway VPC attachment (`tgw-attach-`).
    TransitGatewayVpcAttachment,
    /// Transit gateway peering attachment (`tgw-attach-`, name mentions `peer`).
    TransitGatewayPeeringAttachment,
    /// Transit gateway route table (`tgw-rtb-`), removed with its gateway.
    TransitGatewayRouteTable,
    /// Transit gateway (`tgw-`).
    TransitGateway,
    /// Security group (`sg-`).
    SecurityGroup,
    /// Subnet (`subnet-`).
    Subnet,
    /// VPC route table (`rtb-`).
    RouteTable,
    /// Internet gateway (`igw-`).
    InternetGateway,
    /// VPC (`vpc-`).
    Vpc,
}

impl ResourceKind {
    /// All kinds in teardown order.
    pub const ALL: [Self; 10] = [
        Self::Instance,
        Self::TransitGatewayVpcAttachment,
        Self::TransitGatewayPeeringAttachment,
        Self::TransitGatewayRouteTable,
        Self::TransitGateway,
        Self::SecurityGroup,
        Self::Subnet,
        Self::RouteTable,
        Self::InternetGateway,
        Self::Vpc,
    ];

    /// Classify a recorded resource.
    ///
    /// The provider ID prefix is authoritative. Records whose ID carries no
    /// known prefix fall back to substring matching on the logical name.
    #[must_use]
    pub fn classify(name: &str, id: &str) -> Option<Self> {
        Self::from_id(name, id).or_else(|| Self::from_name(name))
    }

    /// Position of this kind in the teardown sequence (lower goes first).
    #[must_use]
    pub fn teardown_rank(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(Self::ALL.len())
    }

    /// Human-readable label used in logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::TransitGatewayVpcAttachment => "transit gateway VPC attachment",
            Self::TransitGatewayPeeringAttachment => "transit gateway peering attachment",
            Self::TransitGatewayRouteTable => "transit gateway route table",
            Self::TransitGateway => "transit gateway",
            Self::SecurityGroup => "security group",
            Self::Subnet => "subnet",
            Self::RouteTable => "route table",
            Self::InternetGateway => "internet gateway",
            Self::Vpc => "VPC",
        }
    }

    fn from_id(name: &str, id: &str) -> Option<Self> {
        if id.starts_with("tgw-attach-") {
            return Some(if mentions_peering(name) {
                Self::TransitGatewayPeeringAttachment
            } else {
                Self::TransitGatewayVpcAttachment
            });
        }
        if id.starts_with("tgw-rtb-") {
            return Some(Self::TransitGatewayRouteTable);
        }
        let (prefix, _) = id.split_once('-')?;
        match prefix {
            "i" => Some(Self::Instance),
            "tgw" => Some(Self::TransitGateway),
            "sg" => Some(Self::SecurityGroup),
            "subnet" => Some(Self::Subnet),
            "rtb" => Some(Self::RouteTable),
            "igw" => Some(Self::InternetGateway),
            "vpc" => Some(Self::Vpc),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let is_route_table = name.contains("route_table")
            || name.contains("rtb")
            || name.ends_with("_rt")
            || name.contains("_rt_");

        if mentions_peering(&name) {
            Some(Self::TransitGatewayPeeringAttachment)
        } else if name.contains("attach") {
            Some(Self::TransitGatewayVpcAttachment)
        } else if name.contains("tgw") && is_route_table {
            Some(Self::TransitGatewayRouteTable)
        } else if name.contains("tgw") {
            Some(Self::TransitGateway)
        } else if name.starts_with("sg") || name.contains("sg_") {
            Some(Self::SecurityGroup)
        } else if name.contains("subnet") {
            Some(Self::Subnet)
        } else if name.contains("igw") {
            Some(Self::InternetGateway)
        } else if is_route_table {
            Some(Self::RouteTable)
        } else if name.contains("ec2") || name.contains("instance") {
            Some(Self::Instance)
        } else if name.contains("vpc") {
            Some(Self::Vpc)
        } else {
            None
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn mentions_peering(name: &str) -> bool {
    name.to_ascii_lowercase().contains("peer")
}
