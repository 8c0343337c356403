//! Two VPCs in one region, joined by one transit gateway.
//!
//! VPC 1 has a public subnet routed to an internet gateway through the
//! VPC's main route table, and a private subnet with its own route table.
//! VPC 2 has a single private subnet using its main route table. Both private
//! subnets carry the transit gateway attachments and route the other VPC's
//! range through the gateway.

use tracing::info;

use super::{Outcome, Phase, checkpoint, interrupted_in};
use crate::checkpoint::Checkpoint;
use crate::error::TransitNetResult;
use crate::provider::NetworkApi;
use crate::provision::{InstancePlan, Provisioner};
use crate::topology::IntraRegionTopology;
use crate::types::Region;

/// Provision the whole scenario, asking `checkpoint` between phases.
///
/// Resources go to the topology's `REGION`, or `default_region` when unset.
pub async fn run<P: NetworkApi + ?Sized>(
    topology: &IntraRegionTopology,
    default_region: &Region,
    provisioner: &Provisioner<'_, P>,
    checkpoint_with: &dyn Checkpoint,
) -> TransitNetResult<Outcome> {
    topology.validate()?;
    let region = topology.region.as_ref().unwrap_or(default_region);
    info!(%region, "provisioning intra-region topology");

    let cancel = provisioner.cancel_signal();

    if let Some(end) = interrupted_in(Phase::Network, create_vpcs(topology, region, provisioner).await)? {
        return Ok(end);
    }
    if let Some(end) = checkpoint(checkpoint_with, cancel, Phase::Network).await? {
        return Ok(end);
    }

    if let Some(end) = interrupted_in(Phase::Transit, create_tgw(topology, region, provisioner).await)? {
        return Ok(end);
    }
    if let Some(end) = checkpoint(checkpoint_with, cancel, Phase::Transit).await? {
        return Ok(end);
    }

    if let Some(end) = interrupted_in(Phase::Instances, create_vms(topology, region, provisioner).await)? {
        return Ok(end);
    }
    info!("{}", Phase::Instances.checkpoint_message());
    Ok(Outcome::Completed)
}

/// Network phase: VPCs, subnets, internet gateway, route tables.
pub async fn create_vpcs<P: NetworkApi + ?Sized>(
    t: &IntraRegionTopology,
    region: &Region,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;
    let az1 = t.region1_az.as_deref();
    let az2 = t.region2_az.as_deref();

    p.create_vpc(region, &l.vpc1, &l.ip_cidr1).await?;
    p.create_vpc(region, &l.vpc2, &l.ip_cidr2).await?;

    p.create_subnet(region, &l.subnet1_vpc1, &l.subnet_cidr11, &l.vpc1, az1)
        .await?;
    p.create_subnet(region, &l.subnet2_vpc1, &l.subnet_cidr12, &l.vpc1, az1)
        .await?;
    p.create_subnet(region, &l.subnet1_vpc2, &l.subnet_cidr21, &l.vpc2, az2)
        .await?;

    p.create_internet_gateway(region, &l.igw).await?;
    p.attach_vpc_with_igw(region, &l.vpc1, &l.igw).await?;

    p.find_existing_route_table(region, &l.vpc1_pub_route_table, &l.vpc1)
        .await?;
    p.create_route_with_igw(region, &l.igw, &l.vpc1_pub_route_table, "0.0.0.0/0")
        .await?;
    p.find_existing_route_table(region, &l.vpc2_pri_route_table, &l.vpc2)
        .await?;
    p.create_routing_table_associate(region, &l.vpc1_pri_route_table, &l.vpc1, &l.subnet2_vpc1)
        .await?;
    Ok(())
}

/// Transit phase: the gateway, both VPC attachments, cross-VPC routes.
pub async fn create_tgw<P: NetworkApi + ?Sized>(
    t: &IntraRegionTopology,
    region: &Region,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;

    p.create_transit_gateway(region, &t.tgw, None).await?;
    p.create_transit_gateway_attachment(region, &l.tgw_attach_vpc1, &t.tgw, &l.vpc1, &l.subnet2_vpc1)
        .await?;
    p.create_transit_gateway_attachment(region, &l.tgw_attach_vpc2, &t.tgw, &l.vpc2, &l.subnet1_vpc2)
        .await?;

    p.create_route_with_tgw(region, &t.tgw, &l.ip_cidr2, &l.vpc1_pri_route_table)
        .await?;
    p.create_route_with_tgw(region, &t.tgw, &l.ip_cidr1, &l.vpc2_pri_route_table)
        .await?;
    Ok(())
}

/// Instance phase: one security group and one instance per subnet.
pub async fn create_vms<P: NetworkApi + ?Sized>(
    t: &IntraRegionTopology,
    region: &Region,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;
    let key_pair = l.key_pair.as_deref();

    p.create_security_group(region, &l.sg_pub_1_vpc1, &l.ec2_pub_1_vpc1, &l.vpc1)
        .await?;
    p.create_security_group(region, &l.sg_pri_2_vpc1, &l.ec2_pri_2_vpc1, &l.vpc1)
        .await?;
    p.create_security_group(region, &l.sg_pri_1_vpc2, &l.ec2_pri_1_vpc2, &l.vpc2)
        .await?;

    let plans = [
        InstancePlan {
            name: &l.ec2_pub_1_vpc1,
            subnet: &l.subnet1_vpc1,
            security_group: &l.sg_pub_1_vpc1,
            image_id: &t.image,
            instance_type: &l.instance_type,
            key_pair,
            public_ip: true,
        },
        InstancePlan {
            name: &l.ec2_pri_2_vpc1,
            subnet: &l.subnet2_vpc1,
            security_group: &l.sg_pri_2_vpc1,
            image_id: &t.image,
            instance_type: &l.instance_type,
            key_pair,
            public_ip: false,
        },
        InstancePlan {
            name: &l.ec2_pri_1_vpc2,
            subnet: &l.subnet1_vpc2,
            security_group: &l.sg_pri_1_vpc2,
            image_id: &t.image,
            instance_type: &l.instance_type,
            key_pair,
            public_ip: false,
        },
    ];
    for plan in &plans {
        p.create_ec2(region, plan).await?;
    }
    Ok(())
}
