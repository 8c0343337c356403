//! Cloud provider seam.
//!
//! [`NetworkApi`] lists every EC2/STS call the provisioning and teardown
//! logic needs. `transitnet-ec2` implements it on top of the AWS SDK; tests
//! use an in-memory fake.
//!
//! Every call takes the [`Region`] explicitly because the inter-region
//! scenario talks to two regions within one run. Resources that accept tags
//! are tagged `Name=<logical name>`.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::Region;

/// Target of a VPC route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Route through an internet gateway.
    InternetGateway(String),
    /// Route through a transit gateway.
    TransitGateway(String),
}

/// Observed state of a transit gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitGatewayStatus {
    /// Lifecycle state (`pending`, `available`, `deleting`, ...).
    pub state: String,
    /// Default association route table, assigned once the gateway is available.
    pub default_route_table_id: Option<String>,
}

/// One ingress rule, open to a CIDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// IP protocol (`tcp`, `icmp`, ...).
    pub protocol: String,
    /// First port (or ICMP type, `-1` for all).
    pub from_port: i32,
    /// Last port (or ICMP code, `-1` for all).
    pub to_port: i32,
    /// Source CIDR.
    pub cidr: String,
}

impl IngressRule {
    /// SSH from anywhere.
    #[must_use]
    pub fn ssh_from_anywhere() -> Self {
        Self {
            protocol: "tcp".to_owned(),
            from_port: 22,
            to_port: 22,
            cidr: "0.0.0.0/0".to_owned(),
        }
    }

    /// All ICMP from anywhere.
    #[must_use]
    pub fn icmp_from_anywhere() -> Self {
        Self {
            protocol: "icmp".to_owned(),
            from_port: -1,
            to_port: -1,
            cidr: "0.0.0.0/0".to_owned(),
        }
    }
}

/// Parameters of a single instance launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    /// Value of the `Name` tag.
    pub name: String,
    /// AMI ID.
    pub image_id: String,
    /// Instance type (e.g. `t2.micro`).
    pub instance_type: String,
    /// Key pair name, if any.
    pub key_name: Option<String>,
    /// Subnet for the primary network interface.
    pub subnet_id: String,
    /// Security group for the primary network interface.
    pub security_group_id: String,
    /// Whether to associate a public IPv4 address.
    pub associate_public_ip: bool,
}

/// Parameters of a transit gateway peering request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringRequest {
    /// Value of the `Name` tag.
    pub name: String,
    /// Requesting transit gateway (in the calling region).
    pub transit_gateway_id: String,
    /// Accepting transit gateway.
    pub peer_transit_gateway_id: String,
    /// Region of the accepting transit gateway.
    pub peer_region: Region,
    /// Account owning the accepting transit gateway.
    pub peer_account_id: String,
}

/// EC2 and STS operations used by transitnet.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Account ID of the caller.
    async fn account_id(&self, region: &Region) -> ProviderResult<String>;

    // ----- VPCs -----

    /// Create a VPC with default tenancy and return its ID.
    async fn create_vpc(&self, region: &Region, name: &str, cidr: &str)
    -> ProviderResult<String>;

    /// Current VPC state (`pending`, `available`).
    async fn vpc_state(&self, region: &Region, vpc_id: &str) -> ProviderResult<String>;

    /// Delete a VPC.
    async fn delete_vpc(&self, region: &Region, vpc_id: &str) -> ProviderResult<()>;

    // ----- Subnets -----

    /// Create a subnet and return its ID.
    async fn create_subnet(
        &self,
        region: &Region,
        name: &str,
        vpc_id: &str,
        cidr: &str,
        availability_zone: Option<&str>,
    ) -> ProviderResult<String>;

    /// Delete a subnet.
    async fn delete_subnet(&self, region: &Region, subnet_id: &str) -> ProviderResult<()>;

    // ----- Internet gateways -----

    /// Create an internet gateway and return its ID.
    async fn create_internet_gateway(&self, region: &Region, name: &str)
    -> ProviderResult<String>;

    /// Attach an internet gateway to a VPC.
    async fn attach_internet_gateway(
        &self,
        region: &Region,
        igw_id: &str,
        vpc_id: &str,
    ) -> ProviderResult<()>;

    /// Detach an internet gateway from every VPC, then delete it.
    async fn delete_internet_gateway(&self, region: &Region, igw_id: &str) -> ProviderResult<()>;

    // ----- Route tables -----

    /// ID of the main route table of a VPC.
    async fn main_route_table(&self, region: &Region, vpc_id: &str) -> ProviderResult<String>;

    /// Whether a route table is the main table of its VPC.
    async fn is_main_route_table(&self, region: &Region, route_table_id: &str)
    -> ProviderResult<bool>;

    /// Create a route table in a VPC and return its ID.
    async fn create_route_table(
        &self,
        region: &Region,
        name: &str,
        vpc_id: &str,
    ) -> ProviderResult<String>;

    /// Associate a route table with a subnet; returns the association ID.
    async fn associate_route_table(
        &self,
        region: &Region,
        route_table_id: &str,
        subnet_id: &str,
    ) -> ProviderResult<String>;

    /// Add a route to a route table.
    async fn create_route(
        &self,
        region: &Region,
        route_table_id: &str,
        destination_cidr: &str,
        target: &RouteTarget,
    ) -> ProviderResult<()>;

    /// Delete a (non-main) route table.
    async fn delete_route_table(&self, region: &Region, route_table_id: &str)
    -> ProviderResult<()>;

    // ----- Transit gateways -----

    /// Create a transit gateway with the given private ASN and return its ID.
    async fn create_transit_gateway(
        &self,
        region: &Region,
        name: &str,
        amazon_side_asn: i64,
    ) -> ProviderResult<String>;

    /// Current transit gateway state and default route table.
    async fn describe_transit_gateway(
        &self,
        region: &Region,
        tgw_id: &str,
    ) -> ProviderResult<TransitGatewayStatus>;

    /// Delete a transit gateway.
    async fn delete_transit_gateway(&self, region: &Region, tgw_id: &str) -> ProviderResult<()>;

    /// Attach a VPC to a transit gateway through the given subnets.
    async fn create_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        name: &str,
        tgw_id: &str,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> ProviderResult<String>;

    /// Delete a VPC attachment.
    async fn delete_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()>;

    /// Request peering between two transit gateways.
    async fn create_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        request: &PeeringRequest,
    ) -> ProviderResult<String>;

    /// Accept a peering request (called in the accepter's region).
    async fn accept_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()>;

    /// Delete a peering attachment.
    async fn delete_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()>;

    /// Current state of any transit gateway attachment.
    async fn transit_gateway_attachment_state(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<String>;

    /// Add a static route to a transit gateway route table.
    async fn create_transit_gateway_route(
        &self,
        region: &Region,
        tgw_route_table_id: &str,
        destination_cidr: &str,
        attachment_id: &str,
    ) -> ProviderResult<()>;

    // ----- Security groups -----

    /// Create a security group and return its ID.
    async fn create_security_group(
        &self,
        region: &Region,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> ProviderResult<String>;

    /// Add ingress rules to a security group.
    async fn authorize_security_group_ingress(
        &self,
        region: &Region,
        group_id: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<()>;

    /// Delete a security group.
    async fn delete_security_group(&self, region: &Region, group_id: &str) -> ProviderResult<()>;

    // ----- Instances -----

    /// Launch one instance and return its ID.
    async fn run_instance(&self, region: &Region, spec: &InstanceSpec) -> ProviderResult<String>;

    /// Current instance state (`pending`, `running`, `terminated`, ...).
    async fn instance_state(&self, region: &Region, instance_id: &str) -> ProviderResult<String>;

    /// Terminate an instance.
    async fn terminate_instance(&self, region: &Region, instance_id: &str) -> ProviderResult<()>;
}
