//! [`NetworkApi`] on top of `aws-sdk-ec2` and `aws-sdk-sts`.

use async_trait::async_trait;
use aws_sdk_ec2::operation::create_transit_gateway::builders::CreateTransitGatewayFluentBuilder;
use aws_sdk_ec2::types::{
    Filter, InstanceNetworkInterfaceSpecification, InstanceType, IpPermission, IpRange,
    ResourceType, Tag, TagSpecification, Tenancy, TransitGatewayRequestOptions,
};
use tracing::debug;
use transitnet_core::{
    IngressRule, InstanceSpec, NetworkApi, PeeringRequest, ProviderError, ProviderResult, Region,
    RouteTarget, TransitGatewayStatus, TransitNetConfig,
};

use crate::client::RegionalClients;
use crate::error::sdk_error;

/// AWS-backed network provider.
#[derive(Debug)]
pub struct AwsNetwork {
    clients: RegionalClients,
}

impl AwsNetwork {
    /// Wrap prebuilt regional clients.
    #[must_use]
    pub fn new(clients: RegionalClients) -> Self {
        Self { clients }
    }

    /// Build the provider from transitnet's configuration.
    pub async fn connect(config: &TransitNetConfig) -> Self {
        Self::new(RegionalClients::from_config(config).await)
    }
}

/// Description carried by every transit gateway; the logical name goes in
/// the `Name` tag.
const TRANSIT_GATEWAY_DESCRIPTION: &str = "Automated Transit gateway created to connect VPCs";

fn transit_gateway_request(
    client: &aws_sdk_ec2::Client,
    name: &str,
    amazon_side_asn: i64,
) -> CreateTransitGatewayFluentBuilder {
    client
        .create_transit_gateway()
        .description(TRANSIT_GATEWAY_DESCRIPTION)
        .options(
            TransitGatewayRequestOptions::builder()
                .amazon_side_asn(amazon_side_asn)
                .build(),
        )
        .tag_specifications(name_tag(ResourceType::TransitGateway, name))
}

fn name_tag(resource_type: ResourceType, name: &str) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .tags(Tag::builder().key("Name").value(name).build())
        .build()
}

fn required(value: Option<&str>, field: &'static str) -> ProviderResult<String> {
    value
        .map(ToOwned::to_owned)
        .ok_or(ProviderError::MissingField(field))
}

fn not_found(what: &str, id: &str) -> ProviderError {
    ProviderError::NotFound(format!("{what} {id} does not exist"))
}

fn ip_permission(rule: &IngressRule) -> IpPermission {
    IpPermission::builder()
        .ip_protocol(&rule.protocol)
        .from_port(rule.from_port)
        .to_port(rule.to_port)
        .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr).build())
        .build()
}

#[async_trait]
impl NetworkApi for AwsNetwork {
    async fn account_id(&self, region: &Region) -> ProviderResult<String> {
        let out = self
            .clients
            .sts(region)
            .get_caller_identity()
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.account(), "Account")
    }

    async fn create_vpc(&self, region: &Region, name: &str, cidr: &str) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_vpc()
            .cidr_block(cidr)
            .instance_tenancy(Tenancy::Default)
            .tag_specifications(name_tag(ResourceType::Vpc, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.vpc().and_then(|v| v.vpc_id()), "VpcId")
    }

    async fn vpc_state(&self, region: &Region, vpc_id: &str) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .describe_vpcs()
            .vpc_ids(vpc_id)
            .send()
            .await
            .map_err(sdk_error)?;
        let vpc = out.vpcs().first().ok_or_else(|| not_found("VPC", vpc_id))?;
        required(vpc.state().map(|s| s.as_str()), "VpcState")
    }

    async fn delete_vpc(&self, region: &Region, vpc_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_vpc()
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_subnet(
        &self,
        region: &Region,
        name: &str,
        vpc_id: &str,
        cidr: &str,
        availability_zone: Option<&str>,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_subnet()
            .vpc_id(vpc_id)
            .cidr_block(cidr)
            .set_availability_zone(availability_zone.map(ToOwned::to_owned))
            .tag_specifications(name_tag(ResourceType::Subnet, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.subnet().and_then(|s| s.subnet_id()), "SubnetId")
    }

    async fn delete_subnet(&self, region: &Region, subnet_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_subnet()
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_internet_gateway(&self, region: &Region, name: &str) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_internet_gateway()
            .tag_specifications(name_tag(ResourceType::InternetGateway, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(
            out.internet_gateway().and_then(|g| g.internet_gateway_id()),
            "InternetGatewayId",
        )
    }

    async fn attach_internet_gateway(
        &self,
        region: &Region,
        igw_id: &str,
        vpc_id: &str,
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .attach_internet_gateway()
            .internet_gateway_id(igw_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_internet_gateway(&self, region: &Region, igw_id: &str) -> ProviderResult<()> {
        let ec2 = self.clients.ec2(region);
        let out = ec2
            .describe_internet_gateways()
            .internet_gateway_ids(igw_id)
            .send()
            .await
            .map_err(sdk_error)?;

        let attached: Vec<String> = out
            .internet_gateways()
            .iter()
            .flat_map(|g| g.attachments())
            .filter_map(|a| a.vpc_id().map(ToOwned::to_owned))
            .collect();
        for vpc_id in attached {
            debug!(igw = igw_id, vpc = %vpc_id, "detaching internet gateway");
            ec2.detach_internet_gateway()
                .internet_gateway_id(igw_id)
                .vpc_id(&vpc_id)
                .send()
                .await
                .map_err(sdk_error)?;
        }

        ec2.delete_internet_gateway()
            .internet_gateway_id(igw_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn main_route_table(&self, region: &Region, vpc_id: &str) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .describe_route_tables()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .filters(Filter::builder().name("association.main").values("true").build())
            .send()
            .await
            .map_err(sdk_error)?;
        let table = out
            .route_tables()
            .first()
            .ok_or_else(|| not_found("main route table of", vpc_id))?;
        required(table.route_table_id(), "RouteTableId")
    }

    async fn is_main_route_table(
        &self,
        region: &Region,
        route_table_id: &str,
    ) -> ProviderResult<bool> {
        let out = self
            .clients
            .ec2(region)
            .describe_route_tables()
            .route_table_ids(route_table_id)
            .send()
            .await
            .map_err(sdk_error)?;
        let table = out
            .route_tables()
            .first()
            .ok_or_else(|| not_found("route table", route_table_id))?;
        Ok(table.associations().iter().any(|a| a.main() == Some(true)))
    }

    async fn create_route_table(
        &self,
        region: &Region,
        name: &str,
        vpc_id: &str,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_route_table()
            .vpc_id(vpc_id)
            .tag_specifications(name_tag(ResourceType::RouteTable, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.route_table().and_then(|t| t.route_table_id()), "RouteTableId")
    }

    async fn associate_route_table(
        &self,
        region: &Region,
        route_table_id: &str,
        subnet_id: &str,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .associate_route_table()
            .route_table_id(route_table_id)
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.association_id(), "AssociationId")
    }

    async fn create_route(
        &self,
        region: &Region,
        route_table_id: &str,
        destination_cidr: &str,
        target: &RouteTarget,
    ) -> ProviderResult<()> {
        let request = self
            .clients
            .ec2(region)
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination_cidr);
        let request = match target {
            RouteTarget::InternetGateway(id) => request.gateway_id(id),
            RouteTarget::TransitGateway(id) => request.transit_gateway_id(id),
        };
        request.send().await.map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_route_table(&self, region: &Region, route_table_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_route_table()
            .route_table_id(route_table_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_transit_gateway(
        &self,
        region: &Region,
        name: &str,
        amazon_side_asn: i64,
    ) -> ProviderResult<String> {
        let out = transit_gateway_request(&self.clients.ec2(region), name, amazon_side_asn)
            .send()
            .await
            .map_err(sdk_error)?;
        required(
            out.transit_gateway().and_then(|t| t.transit_gateway_id()),
            "TransitGatewayId",
        )
    }

    async fn describe_transit_gateway(
        &self,
        region: &Region,
        tgw_id: &str,
    ) -> ProviderResult<TransitGatewayStatus> {
        let out = self
            .clients
            .ec2(region)
            .describe_transit_gateways()
            .transit_gateway_ids(tgw_id)
            .send()
            .await
            .map_err(sdk_error)?;
        let tgw = out
            .transit_gateways()
            .first()
            .ok_or_else(|| not_found("transit gateway", tgw_id))?;
        Ok(TransitGatewayStatus {
            state: required(tgw.state().map(|s| s.as_str()), "TransitGatewayState")?,
            default_route_table_id: tgw
                .options()
                .and_then(|o| o.association_default_route_table_id())
                .map(ToOwned::to_owned),
        })
    }

    async fn delete_transit_gateway(&self, region: &Region, tgw_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_transit_gateway()
            .transit_gateway_id(tgw_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        name: &str,
        tgw_id: &str,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_transit_gateway_vpc_attachment()
            .transit_gateway_id(tgw_id)
            .vpc_id(vpc_id)
            .set_subnet_ids(Some(subnet_ids.to_vec()))
            .tag_specifications(name_tag(ResourceType::TransitGatewayAttachment, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(
            out.transit_gateway_vpc_attachment()
                .and_then(|a| a.transit_gateway_attachment_id()),
            "TransitGatewayAttachmentId",
        )
    }

    async fn delete_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_transit_gateway_vpc_attachment()
            .transit_gateway_attachment_id(attachment_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        request: &PeeringRequest,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_transit_gateway_peering_attachment()
            .transit_gateway_id(&request.transit_gateway_id)
            .peer_transit_gateway_id(&request.peer_transit_gateway_id)
            .peer_account_id(&request.peer_account_id)
            .peer_region(request.peer_region.as_str())
            .tag_specifications(name_tag(ResourceType::TransitGatewayAttachment, &request.name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(
            out.transit_gateway_peering_attachment()
                .and_then(|a| a.transit_gateway_attachment_id()),
            "TransitGatewayAttachmentId",
        )
    }

    async fn accept_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .accept_transit_gateway_peering_attachment()
            .transit_gateway_attachment_id(attachment_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_transit_gateway_peering_attachment()
            .transit_gateway_attachment_id(attachment_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn transit_gateway_attachment_state(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .describe_transit_gateway_attachments()
            .transit_gateway_attachment_ids(attachment_id)
            .send()
            .await
            .map_err(sdk_error)?;
        let attachment = out
            .transit_gateway_attachments()
            .first()
            .ok_or_else(|| not_found("transit gateway attachment", attachment_id))?;
        required(
            attachment.state().map(|s| s.as_str()),
            "TransitGatewayAttachmentState",
        )
    }

    async fn create_transit_gateway_route(
        &self,
        region: &Region,
        tgw_route_table_id: &str,
        destination_cidr: &str,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .create_transit_gateway_route()
            .transit_gateway_route_table_id(tgw_route_table_id)
            .destination_cidr_block(destination_cidr)
            .transit_gateway_attachment_id(attachment_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_security_group(
        &self,
        region: &Region,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .create_security_group()
            .group_name(name)
            .description(description)
            .vpc_id(vpc_id)
            .tag_specifications(name_tag(ResourceType::SecurityGroup, name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(out.group_id(), "GroupId")
    }

    async fn authorize_security_group_ingress(
        &self,
        region: &Region,
        group_id: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .authorize_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(rules.iter().map(ip_permission).collect()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_security_group(&self, region: &Region, group_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn run_instance(&self, region: &Region, spec: &InstanceSpec) -> ProviderResult<String> {
        let interface = InstanceNetworkInterfaceSpecification::builder()
            .device_index(0)
            .subnet_id(&spec.subnet_id)
            .groups(&spec.security_group_id)
            .associate_public_ip_address(spec.associate_public_ip)
            .build();
        let out = self
            .clients
            .ec2(region)
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .min_count(1)
            .max_count(1)
            .set_key_name(spec.key_name.clone())
            .network_interfaces(interface)
            .tag_specifications(name_tag(ResourceType::Instance, &spec.name))
            .send()
            .await
            .map_err(sdk_error)?;
        required(
            out.instances().first().and_then(|i| i.instance_id()),
            "InstanceId",
        )
    }

    async fn instance_state(&self, region: &Region, instance_id: &str) -> ProviderResult<String> {
        let out = self
            .clients
            .ec2(region)
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(sdk_error)?;
        let instance = out
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .ok_or_else(|| not_found("instance", instance_id))?;
        required(
            instance.state().and_then(|s| s.name()).map(|n| n.as_str()),
            "InstanceState",
        )
    }

    async fn terminate_instance(&self, region: &Region, instance_id: &str) -> ProviderResult<()> {
        self.clients
            .ec2(region)
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
