//! Provisioning steps.
//!
//! Each step resolves the resources it depends on by logical name through
//! the [`ResourceStore`], calls the provider, records the new ID under its
//! own logical name, and waits for the resource to settle where the
//! provider creates it asynchronously.
//!
//! A step whose logical name is already recorded reuses the recorded ID, so
//! re-running a scenario after an interrupted run picks up where it stopped.
//!
//! Cancellation is only honoured before a step starts and while waiting for
//! a recorded resource to settle, never between a create call and the store
//! write recording its result.

use std::future::Future;

use tracing::info;

use crate::cancel::CancelSignal;
use crate::error::{ProviderError, ProviderResult, TransitNetError, TransitNetResult};
use crate::poll::{PollSettings, wait_for_created};
use crate::provider::{IngressRule, InstanceSpec, NetworkApi, PeeringRequest, RouteTarget};
use crate::state::{ResourceRecord, ResourceStore};
use crate::types::Region;

/// Lowest private ASN accepted for a transit gateway.
const PRIVATE_ASN_MIN: i64 = 64_512;
/// Upper bound (exclusive) of the ASN range drawn from.
const PRIVATE_ASN_MAX: i64 = 65_534;

/// One instance to launch, expressed in logical names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan<'a> {
    /// Logical name of the instance.
    pub name: &'a str,
    /// Logical name of its subnet.
    pub subnet: &'a str,
    /// Logical name of its security group.
    pub security_group: &'a str,
    /// AMI ID.
    pub image_id: &'a str,
    /// Instance type.
    pub instance_type: &'a str,
    /// Key pair, if any.
    pub key_pair: Option<&'a str>,
    /// Whether the instance gets a public IPv4 address.
    pub public_ip: bool,
}

/// Executes provisioning steps against a [`NetworkApi`], recording results
/// in a [`ResourceStore`].
#[derive(Debug)]
pub struct Provisioner<'a, P: ?Sized> {
    api: &'a P,
    store: &'a ResourceStore,
    poll: PollSettings,
    cancel: CancelSignal,
}

impl<'a, P: NetworkApi + ?Sized> Provisioner<'a, P> {
    /// Create a provisioner.
    pub fn new(api: &'a P, store: &'a ResourceStore, poll: PollSettings) -> Self {
        Self {
            api,
            store,
            poll,
            cancel: CancelSignal::never(),
        }
    }

    /// Stop before the next step once `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// The signal this provisioner stops on.
    #[must_use]
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// The store results are recorded in.
    #[must_use]
    pub fn store(&self) -> &ResourceStore {
        self.store
    }

    // ----- VPC services -----

    /// Create a VPC and wait until it is available.
    pub async fn create_vpc(
        &self,
        region: &Region,
        name: &str,
        cidr: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let id = match self.recorded(name)? {
            Some(id) => id,
            None => {
                let id = self.api.create_vpc(region, name, cidr).await?;
                self.record(name, &id, region)?;
                info!(name, id = %id, region = %region, cidr, "created VPC");
                id
            }
        };

        let api = self.api;
        let vpc_id = id.as_str();
        self.settle("VPC", vpc_id, &["available"], move || api.vpc_state(region, vpc_id))
            .await?;
        Ok(id)
    }

    /// Create a subnet inside the VPC recorded as `vpc`.
    pub async fn create_subnet(
        &self,
        region: &Region,
        name: &str,
        cidr: &str,
        vpc: &str,
        availability_zone: Option<&str>,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        if let Some(id) = self.recorded(name)? {
            return Ok(id);
        }
        let vpc_id = self.store.id(vpc)?;
        let id = self
            .api
            .create_subnet(region, name, &vpc_id, cidr, availability_zone)
            .await?;
        self.record(name, &id, region)?;
        info!(name, id = %id, vpc = %vpc_id, cidr, az = ?availability_zone, "created subnet");
        Ok(id)
    }

    /// Create an internet gateway.
    pub async fn create_internet_gateway(
        &self,
        region: &Region,
        name: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        if let Some(id) = self.recorded(name)? {
            return Ok(id);
        }
        let id = self.api.create_internet_gateway(region, name).await?;
        self.record(name, &id, region)?;
        info!(name, id = %id, region = %region, "created internet gateway");
        Ok(id)
    }

    /// Attach the internet gateway recorded as `igw` to the VPC recorded as
    /// `vpc`.
    pub async fn attach_vpc_with_igw(
        &self,
        region: &Region,
        vpc: &str,
        igw: &str,
    ) -> TransitNetResult<()> {
        self.ensure_running()?;
        let vpc_id = self.store.id(vpc)?;
        let igw_id = self.store.id(igw)?;
        let attached = self
            .api
            .attach_internet_gateway(region, &igw_id, &vpc_id)
            .await;
        tolerate_existing(attached, "internet gateway attachment")?;
        info!(igw = %igw_id, vpc = %vpc_id, "attached internet gateway");
        Ok(())
    }

    /// Record the main route table of the VPC recorded as `vpc` under
    /// `route_table`.
    pub async fn find_existing_route_table(
        &self,
        region: &Region,
        route_table: &str,
        vpc: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        if let Some(id) = self.recorded(route_table)? {
            return Ok(id);
        }
        let vpc_id = self.store.id(vpc)?;
        let id = self.api.main_route_table(region, &vpc_id).await?;
        self.record(route_table, &id, region)?;
        info!(name = route_table, id = %id, vpc = %vpc_id, "found main route table");
        Ok(id)
    }

    /// Route `destination` through the internet gateway recorded as `igw`.
    pub async fn create_route_with_igw(
        &self,
        region: &Region,
        igw: &str,
        route_table: &str,
        destination: &str,
    ) -> TransitNetResult<()> {
        self.ensure_running()?;
        let igw_id = self.store.id(igw)?;
        let route_table_id = self.store.id(route_table)?;
        let created = self
            .api
            .create_route(
                region,
                &route_table_id,
                destination,
                &RouteTarget::InternetGateway(igw_id.clone()),
            )
            .await;
        tolerate_existing(created, "route")?;
        info!(igw = %igw_id, route_table = %route_table_id, destination, "created route through internet gateway");
        Ok(())
    }

    /// Create a route table in `vpc` and associate it with `subnet`.
    pub async fn create_routing_table_associate(
        &self,
        region: &Region,
        route_table: &str,
        vpc: &str,
        subnet: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let subnet_id = self.store.id(subnet)?;
        let id = match self.recorded(route_table)? {
            Some(id) => id,
            None => {
                let vpc_id = self.store.id(vpc)?;
                let id = self
                    .api
                    .create_route_table(region, route_table, &vpc_id)
                    .await?;
                self.record(route_table, &id, region)?;
                info!(name = route_table, id = %id, vpc = %vpc_id, "created route table");
                id
            }
        };

        let associated = self
            .api
            .associate_route_table(region, &id, &subnet_id)
            .await
            .map(|association| {
                info!(route_table = %id, subnet = %subnet_id, association = %association, "associated route table");
            });
        tolerate_existing(associated, "route table association")?;
        Ok(id)
    }

    // ----- Transit gateway services -----

    /// Create a transit gateway with a random private ASN and wait until it
    /// is available. When `route_table` is given, the gateway's default
    /// association route table is recorded under that name.
    pub async fn create_transit_gateway(
        &self,
        region: &Region,
        name: &str,
        route_table: Option<&str>,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let id = match self.recorded(name)? {
            Some(id) => id,
            None => {
                let asn = rand::random_range(PRIVATE_ASN_MIN..PRIVATE_ASN_MAX);
                let id = self.api.create_transit_gateway(region, name, asn).await?;
                self.record(name, &id, region)?;
                info!(name, id = %id, region = %region, asn, "created transit gateway");
                id
            }
        };

        let api = self.api;
        let tgw_id = id.as_str();
        self.settle("transit gateway", tgw_id, &["available"], move || async move {
            api.describe_transit_gateway(region, tgw_id)
                .await
                .map(|status| status.state)
        })
        .await?;

        if let Some(route_table) = route_table {
            if self.recorded(route_table)?.is_none() {
                let status = self.api.describe_transit_gateway(region, &id).await?;
                let rtb_id = status
                    .default_route_table_id
                    .ok_or(ProviderError::MissingField("AssociationDefaultRouteTableId"))?;
                self.record(route_table, &rtb_id, region)?;
                info!(name = route_table, id = %rtb_id, tgw = %id, "recorded transit gateway route table");
            }
        }
        Ok(id)
    }

    /// Attach the VPC recorded as `vpc` to the gateway recorded as `tgw`
    /// through `subnet`, and wait until the attachment is available.
    pub async fn create_transit_gateway_attachment(
        &self,
        region: &Region,
        name: &str,
        tgw: &str,
        vpc: &str,
        subnet: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let id = match self.recorded(name)? {
            Some(id) => id,
            None => {
                let tgw_id = self.store.id(tgw)?;
                let vpc_id = self.store.id(vpc)?;
                let subnet_id = self.store.id(subnet)?;
                let id = self
                    .api
                    .create_transit_gateway_vpc_attachment(
                        region,
                        name,
                        &tgw_id,
                        &vpc_id,
                        std::slice::from_ref(&subnet_id),
                    )
                    .await?;
                self.record(name, &id, region)?;
                info!(name, id = %id, tgw = %tgw_id, vpc = %vpc_id, subnet = %subnet_id, "created transit gateway attachment");
                id
            }
        };

        self.wait_for_attachment(region, &id, &["available"]).await?;
        Ok(id)
    }

    /// Route `destination` from the route table recorded as `route_table`
    /// through the gateway recorded as `tgw`.
    pub async fn create_route_with_tgw(
        &self,
        region: &Region,
        tgw: &str,
        destination: &str,
        route_table: &str,
    ) -> TransitNetResult<()> {
        self.ensure_running()?;
        let tgw_id = self.store.id(tgw)?;
        let route_table_id = self.store.id(route_table)?;
        let created = self
            .api
            .create_route(
                region,
                &route_table_id,
                destination,
                &RouteTarget::TransitGateway(tgw_id.clone()),
            )
            .await;
        tolerate_existing(created, "route")?;
        info!(tgw = %tgw_id, route_table = %route_table_id, destination, "created route through transit gateway");
        Ok(())
    }

    /// Request peering from the gateway recorded as `tgw` (in `region`) to
    /// the gateway recorded as `peer_tgw` (in `peer_region`), and wait until
    /// the request is pending acceptance.
    pub async fn create_tgw_peering(
        &self,
        region: &Region,
        name: &str,
        tgw: &str,
        peer_tgw: &str,
        peer_region: &Region,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let id = match self.recorded(name)? {
            Some(id) => id,
            None => {
                let request = PeeringRequest {
                    name: name.to_owned(),
                    transit_gateway_id: self.store.id(tgw)?,
                    peer_transit_gateway_id: self.store.id(peer_tgw)?,
                    peer_region: peer_region.clone(),
                    peer_account_id: self.api.account_id(peer_region).await?,
                };
                let id = self
                    .api
                    .create_transit_gateway_peering_attachment(region, &request)
                    .await?;
                self.record(name, &id, region)?;
                info!(
                    name,
                    id = %id,
                    tgw = %request.transit_gateway_id,
                    peer_tgw = %request.peer_transit_gateway_id,
                    peer_region = %peer_region,
                    "requested transit gateway peering"
                );
                id
            }
        };

        self.wait_for_attachment(region, &id, &["pendingAcceptance", "available"])
            .await?;
        Ok(id)
    }

    /// Accept the peering recorded as `peering` from `accepter_region` and
    /// wait until it is available.
    pub async fn accept_tgw_peering(
        &self,
        accepter_region: &Region,
        peering: &str,
    ) -> TransitNetResult<()> {
        self.ensure_running()?;
        let id = self.store.id(peering)?;
        let state = self
            .wait_for_attachment(accepter_region, &id, &["pendingAcceptance", "available"])
            .await?;

        if state == "pendingAcceptance" {
            self.api
                .accept_transit_gateway_peering_attachment(accepter_region, &id)
                .await?;
            info!(id = %id, region = %accepter_region, "accepted transit gateway peering");
        }

        self.wait_for_attachment(accepter_region, &id, &["available"])
            .await?;
        Ok(())
    }

    /// Add a static route for `destination` to the gateway route table
    /// recorded as `tgw_route_table`, pointing at the peering recorded as
    /// `peering`.
    pub async fn create_tgw_route_with_peering_attachment(
        &self,
        region: &Region,
        tgw_route_table: &str,
        destination: &str,
        peering: &str,
    ) -> TransitNetResult<()> {
        self.ensure_running()?;
        let route_table_id = self.store.id(tgw_route_table)?;
        let attachment_id = self.store.id(peering)?;
        let created = self
            .api
            .create_transit_gateway_route(region, &route_table_id, destination, &attachment_id)
            .await;
        tolerate_existing(created, "transit gateway route")?;
        info!(route_table = %route_table_id, attachment = %attachment_id, destination, "created transit gateway route");
        Ok(())
    }

    // ----- EC2 services -----

    /// Create a security group in the VPC recorded as `vpc` for the
    /// instance named `instance`, open to SSH and ICMP.
    pub async fn create_security_group(
        &self,
        region: &Region,
        group: &str,
        instance: &str,
        vpc: &str,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        let id = match self.recorded(group)? {
            Some(id) => id,
            None => {
                let vpc_id = self.store.id(vpc)?;
                let description = format!("Automated Security Group created for {instance}");
                let id = self
                    .api
                    .create_security_group(region, group, &description, &vpc_id)
                    .await?;
                self.record(group, &id, region)?;
                info!(name = group, id = %id, vpc = %vpc_id, "created security group");
                id
            }
        };

        let rules = [IngressRule::ssh_from_anywhere(), IngressRule::icmp_from_anywhere()];
        let authorized = self
            .api
            .authorize_security_group_ingress(region, &id, &rules)
            .await;
        tolerate_existing(authorized, "security group rules")?;
        info!(id = %id, rules = rules.len(), "authorized security group ingress");
        Ok(id)
    }

    /// Launch one instance.
    pub async fn create_ec2(
        &self,
        region: &Region,
        plan: &InstancePlan<'_>,
    ) -> TransitNetResult<String> {
        self.ensure_running()?;
        if let Some(id) = self.recorded(plan.name)? {
            return Ok(id);
        }
        let spec = InstanceSpec {
            name: plan.name.to_owned(),
            image_id: plan.image_id.to_owned(),
            instance_type: plan.instance_type.to_owned(),
            key_name: plan.key_pair.map(ToOwned::to_owned),
            subnet_id: self.store.id(plan.subnet)?,
            security_group_id: self.store.id(plan.security_group)?,
            associate_public_ip: plan.public_ip,
        };
        let id = self.api.run_instance(region, &spec).await?;
        self.record(plan.name, &id, region)?;
        info!(
            name = plan.name,
            id = %id,
            subnet = %spec.subnet_id,
            image = %spec.image_id,
            public_ip = spec.associate_public_ip,
            "launched instance"
        );
        Ok(id)
    }

    // ----- helpers -----

    fn recorded(&self, name: &str) -> TransitNetResult<Option<String>> {
        if !self.store.contains(name) {
            return Ok(None);
        }
        let id = self.store.id(name)?;
        info!(name, id = %id, "already provisioned, reusing");
        Ok(Some(id))
    }

    fn record(&self, name: &str, id: &str, region: &Region) -> TransitNetResult<()> {
        self.store
            .put(name, ResourceRecord::new(id, region.clone()))
            .map_err(Into::into)
    }

    async fn wait_for_attachment(
        &self,
        region: &Region,
        id: &str,
        wanted: &[&str],
    ) -> TransitNetResult<String> {
        let api = self.api;
        self.settle("transit gateway attachment", id, wanted, move || {
            api.transit_gateway_attachment_state(region, id)
        })
        .await
    }

    fn ensure_running(&self) -> TransitNetResult<()> {
        if self.cancel.is_cancelled() {
            return Err(TransitNetError::Interrupted);
        }
        Ok(())
    }

    /// Wait for a recorded resource to reach `wanted`, giving up early on
    /// cancellation. The resource is already recorded, so a later run
    /// resumes the wait.
    async fn settle<F, Fut>(
        &self,
        what: &str,
        id: &str,
        wanted: &[&str],
        describe: F,
    ) -> TransitNetResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        tokio::select! {
            state = wait_for_created(what, id, wanted, self.poll, describe) => state,
            () = self.cancel.cancelled() => Err(TransitNetError::Interrupted),
        }
    }
}

/// Treat "already in place" as success for idempotent follow-up calls.
fn tolerate_existing(result: ProviderResult<()>, what: &str) -> TransitNetResult<()> {
    match result {
        Err(ProviderError::AlreadyExists(message)) => {
            info!(what, %message, "already in place");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}
