//! Two VPCs in two regions, each attached to its own transit gateway, with
//! the gateways peered.
//!
//! The VPC side mirrors the intra-region layout. Each gateway's default
//! route table gets a static route for the remote VPC range pointing at the
//! peering attachment, which is requested from region 1 and accepted from
//! region 2.

use tracing::info;

use super::{Outcome, Phase, checkpoint, interrupted_in};
use crate::checkpoint::Checkpoint;
use crate::error::TransitNetResult;
use crate::provider::NetworkApi;
use crate::provision::{InstancePlan, Provisioner};
use crate::topology::InterRegionTopology;

/// Provision the whole scenario, asking `checkpoint` between phases.
pub async fn run<P: NetworkApi + ?Sized>(
    topology: &InterRegionTopology,
    provisioner: &Provisioner<'_, P>,
    checkpoint_with: &dyn Checkpoint,
) -> TransitNetResult<Outcome> {
    topology.validate()?;
    info!(
        region1 = %topology.region1,
        region2 = %topology.region2,
        "provisioning inter-region topology"
    );

    let cancel = provisioner.cancel_signal();

    if let Some(end) = interrupted_in(Phase::Network, create_vpcs(topology, provisioner).await)? {
        return Ok(end);
    }
    if let Some(end) = checkpoint(checkpoint_with, cancel, Phase::Network).await? {
        return Ok(end);
    }

    if let Some(end) = interrupted_in(Phase::Transit, create_tgw(topology, provisioner).await)? {
        return Ok(end);
    }
    if let Some(end) = checkpoint(checkpoint_with, cancel, Phase::Transit).await? {
        return Ok(end);
    }

    if let Some(end) = interrupted_in(Phase::Instances, create_vms(topology, provisioner).await)? {
        return Ok(end);
    }
    info!("{}", Phase::Instances.checkpoint_message());
    Ok(Outcome::Completed)
}

/// Network phase. VPC 1 and its internet gateway live in region 1, VPC 2
/// in region 2.
pub async fn create_vpcs<P: NetworkApi + ?Sized>(
    t: &InterRegionTopology,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;
    let (r1, r2) = (&t.region1, &t.region2);
    let az1 = t.region1_az.as_deref();
    let az2 = t.region2_az.as_deref();

    p.create_vpc(r1, &l.vpc1, &l.ip_cidr1).await?;
    p.create_vpc(r2, &l.vpc2, &l.ip_cidr2).await?;

    p.create_subnet(r1, &l.subnet1_vpc1, &l.subnet_cidr11, &l.vpc1, az1)
        .await?;
    p.create_subnet(r1, &l.subnet2_vpc1, &l.subnet_cidr12, &l.vpc1, az1)
        .await?;
    p.create_subnet(r2, &l.subnet1_vpc2, &l.subnet_cidr21, &l.vpc2, az2)
        .await?;

    p.create_internet_gateway(r1, &l.igw).await?;
    p.attach_vpc_with_igw(r1, &l.vpc1, &l.igw).await?;

    p.find_existing_route_table(r1, &l.vpc1_pub_route_table, &l.vpc1)
        .await?;
    p.create_route_with_igw(r1, &l.igw, &l.vpc1_pub_route_table, "0.0.0.0/0")
        .await?;
    p.find_existing_route_table(r2, &l.vpc2_pri_route_table, &l.vpc2)
        .await?;
    p.create_routing_table_associate(r1, &l.vpc1_pri_route_table, &l.vpc1, &l.subnet2_vpc1)
        .await?;
    Ok(())
}

/// Transit phase: both gateways, their VPC attachments and VPC routes, then
/// the peering and the gateway routes across it.
pub async fn create_tgw<P: NetworkApi + ?Sized>(
    t: &InterRegionTopology,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;
    let (r1, r2) = (&t.region1, &t.region2);

    p.create_transit_gateway(r1, &t.tgw_1, Some(t.tgw_1_route_table.as_str()))
        .await?;
    p.create_transit_gateway(r2, &t.tgw_2, Some(t.tgw_2_route_table.as_str()))
        .await?;

    p.create_transit_gateway_attachment(r1, &l.tgw_attach_vpc1, &t.tgw_1, &l.vpc1, &l.subnet2_vpc1)
        .await?;
    p.create_transit_gateway_attachment(r2, &l.tgw_attach_vpc2, &t.tgw_2, &l.vpc2, &l.subnet1_vpc2)
        .await?;

    p.create_route_with_tgw(r1, &t.tgw_1, &l.ip_cidr2, &l.vpc1_pri_route_table)
        .await?;
    p.create_route_with_tgw(r2, &t.tgw_2, &l.ip_cidr1, &l.vpc2_pri_route_table)
        .await?;

    p.create_tgw_peering(r1, &t.tgw_peer_connect, &t.tgw_1, &t.tgw_2, r2)
        .await?;
    p.accept_tgw_peering(r2, &t.tgw_peer_connect).await?;

    p.create_tgw_route_with_peering_attachment(r1, &t.tgw_1_route_table, &l.ip_cidr2, &t.tgw_peer_connect)
        .await?;
    p.create_tgw_route_with_peering_attachment(r2, &t.tgw_2_route_table, &l.ip_cidr1, &t.tgw_peer_connect)
        .await?;
    Ok(())
}

/// Instance phase. Key pairs are regional, so the region 2 instance uses
/// `KEY_PAIR_REGION2`.
pub async fn create_vms<P: NetworkApi + ?Sized>(
    t: &InterRegionTopology,
    p: &Provisioner<'_, P>,
) -> TransitNetResult<()> {
    let l = &t.layout;
    let (r1, r2) = (&t.region1, &t.region2);

    p.create_security_group(r1, &l.sg_pub_1_vpc1, &l.ec2_pub_1_vpc1, &l.vpc1)
        .await?;
    p.create_security_group(r1, &l.sg_pri_2_vpc1, &l.ec2_pri_2_vpc1, &l.vpc1)
        .await?;
    p.create_security_group(r2, &l.sg_pri_1_vpc2, &l.ec2_pri_1_vpc2, &l.vpc2)
        .await?;

    p.create_ec2(
        r1,
        &InstancePlan {
            name: &l.ec2_pub_1_vpc1,
            subnet: &l.subnet1_vpc1,
            security_group: &l.sg_pub_1_vpc1,
            image_id: &t.region1_image,
            instance_type: &l.instance_type,
            key_pair: l.key_pair.as_deref(),
            public_ip: true,
        },
    )
    .await?;
    p.create_ec2(
        r1,
        &InstancePlan {
            name: &l.ec2_pri_2_vpc1,
            subnet: &l.subnet2_vpc1,
            security_group: &l.sg_pri_2_vpc1,
            image_id: &t.region1_image,
            instance_type: &l.instance_type,
            key_pair: l.key_pair.as_deref(),
            public_ip: false,
        },
    )
    .await?;
    p.create_ec2(
        r2,
        &InstancePlan {
            name: &l.ec2_pri_1_vpc2,
            subnet: &l.subnet1_vpc2,
            security_group: &l.sg_pri_1_vpc2,
            image_id: &t.region2_image,
            instance_type: &l.instance_type,
            key_pair: t.key_pair_region2.as_deref(),
            public_ip: false,
        },
    )
    .await?;
    Ok(())
}
