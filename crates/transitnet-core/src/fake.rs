//! In-memory [`NetworkApi`] used by the unit tests.
//!
//! Resources get prefixed IDs like the real service hands out, move through
//! their pending states one describe call at a time, and refuse deletion
//! while something still references them.

use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    IngressRule, InstanceSpec, NetworkApi, PeeringRequest, RouteTarget, TransitGatewayStatus,
};
use crate::types::Region;

pub(crate) const ACCOUNT_ID: &str = "123456789012";

#[derive(Debug, Clone, Default)]
struct Resource {
    region: Region,
    peer_region: Option<Region>,
    state: String,
    pending: VecDeque<String>,
    refs: Vec<String>,
    /// Deleted together with `refs[0]`.
    cascade: bool,
    main: bool,
    asn: Option<i64>,
    default_route_table: Option<String>,
    associations: Vec<String>,
    routes: Vec<(String, String)>,
    rules: Vec<IngressRule>,
    instance: Option<InstanceSpec>,
}

impl Resource {
    fn new(region: &Region, state: &str) -> Self {
        Self {
            region: region.clone(),
            state: state.to_owned(),
            ..Self::default()
        }
    }

    fn then(mut self, states: &[&str]) -> Self {
        self.pending = states.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    fn refs<S: AsRef<str>>(mut self, refs: &[S]) -> Self {
        self.refs = refs.iter().map(|s| s.as_ref().to_owned()).collect();
        self
    }

    fn gone(&self) -> bool {
        matches!(self.state.as_str(), "deleted" | "terminated")
    }

    fn visible_from(&self, region: &Region) -> bool {
        &self.region == region || self.peer_region.as_ref() == Some(region)
    }
}

#[derive(Debug, Default)]
struct Inner {
    next: u64,
    resources: BTreeMap<String, Resource>,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    lagging: BTreeMap<&'static str, usize>,
    deleted: Vec<String>,
}

impl Inner {
    fn insert(&mut self, prefix: &str, resource: Resource) -> String {
        self.next += 1;
        let id = format!("{prefix}-{:017x}", self.next);
        self.resources.insert(id.clone(), resource);
        id
    }

    fn lookup(&mut self, region: &Region, id: &str) -> ProviderResult<&mut Resource> {
        self.resources
            .get_mut(id)
            .filter(|r| r.visible_from(region))
            .ok_or_else(|| not_found(id))
    }

    fn live(&mut self, region: &Region, id: &str) -> ProviderResult<&mut Resource> {
        let resource = self.lookup(region, id)?;
        if resource.gone() {
            return Err(not_found(id));
        }
        Ok(resource)
    }

    /// Advance one pending state transition and return the current state.
    fn describe(&mut self, region: &Region, id: &str) -> ProviderResult<String> {
        let resource = self.lookup(region, id)?;
        if let Some(next) = resource.pending.pop_front() {
            resource.state = next;
        }
        Ok(resource.state.clone())
    }

    fn dependents(&self, id: &str) -> Vec<String> {
        self.resources
            .iter()
            .filter(|(_, r)| !r.gone() && r.refs.iter().any(|dep| dep == id))
            .filter(|(_, r)| !(r.cascade && r.refs.first().map(String::as_str) == Some(id)))
            .map(|(dep_id, _)| dep_id.clone())
            .collect()
    }

    fn delete(&mut self, region: &Region, id: &str) -> ProviderResult<()> {
        self.live(region, id)?;
        let dependents = self.dependents(id);
        if !dependents.is_empty() {
            return Err(ProviderError::DependencyViolation(format!(
                "{id} has dependent object(s): {}",
                dependents.join(", ")
            )));
        }

        let cascaded: Vec<String> = self
            .resources
            .iter()
            .filter(|(_, r)| r.cascade && r.refs.first().map(String::as_str) == Some(id))
            .map(|(child, _)| child.clone())
            .collect();
        for child in cascaded.iter().map(String::as_str).chain(std::iter::once(id)) {
            if let Some(resource) = self.resources.get_mut(child) {
                resource.state = "deleted".to_owned();
                resource.pending.clear();
            }
        }
        for resource in self.resources.values_mut() {
            resource.associations.retain(|subnet| subnet != id);
        }
        self.deleted.push(id.to_owned());
        Ok(())
    }

    fn require<S: AsRef<str>>(&mut self, region: &Region, ids: &[S]) -> ProviderResult<()> {
        for id in ids {
            self.live(region, id.as_ref())?;
        }
        Ok(())
    }
}

fn not_found(id: &str) -> ProviderError {
    ProviderError::NotFound(format!("the ID '{id}' does not exist"))
}

/// Thread-safe in-memory network.
#[derive(Debug, Default)]
pub(crate) struct FakeNetwork {
    inner: Mutex<Inner>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `op` fail with an API error.
    pub(crate) fn fail_on(&self, op: &'static str) {
        self.inner.lock().failing.insert(op);
    }

    /// Answer the next `times` calls of `op` with `NotFound`, like a describe
    /// call that does not see a fresh resource yet.
    pub(crate) fn lag(&self, op: &'static str, times: usize) {
        self.inner.lock().lagging.insert(op, times);
    }

    /// Forget `id` as if it had been deleted out of band.
    pub(crate) fn forget(&self, id: &str) {
        self.inner.lock().resources.remove(id);
    }

    pub(crate) fn count_calls(&self, op: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// IDs in the order they were deleted or terminated.
    pub(crate) fn deleted(&self) -> Vec<String> {
        self.inner.lock().deleted.clone()
    }

    /// IDs of every resource that is not deleted or terminated.
    pub(crate) fn live_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .resources
            .iter()
            .filter(|(_, r)| !r.gone())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn exists(&self, id: &str) -> bool {
        self.inner.lock().resources.get(id).is_some_and(|r| !r.gone())
    }

    pub(crate) fn parent_of(&self, id: &str) -> Option<String> {
        self.inner.lock().resources.get(id)?.refs.first().cloned()
    }

    pub(crate) fn region_of(&self, id: &str) -> Option<Region> {
        self.inner.lock().resources.get(id).map(|r| r.region.clone())
    }

    pub(crate) fn state_of(&self, id: &str) -> Option<String> {
        self.inner.lock().resources.get(id).map(|r| r.state.clone())
    }

    pub(crate) fn asn_of(&self, id: &str) -> Option<i64> {
        self.inner.lock().resources.get(id)?.asn
    }

    pub(crate) fn rules_of(&self, id: &str) -> Vec<IngressRule> {
        self.inner
            .lock()
            .resources
            .get(id)
            .map(|r| r.rules.clone())
            .unwrap_or_default()
    }

    pub(crate) fn routes_of(&self, id: &str) -> Vec<(String, String)> {
        self.inner
            .lock()
            .resources
            .get(id)
            .map(|r| r.routes.clone())
            .unwrap_or_default()
    }

    pub(crate) fn associations_of(&self, id: &str) -> Vec<String> {
        self.inner
            .lock()
            .resources
            .get(id)
            .map(|r| r.associations.clone())
            .unwrap_or_default()
    }

    pub(crate) fn instance_spec(&self, id: &str) -> Option<InstanceSpec> {
        self.inner.lock().resources.get(id)?.instance.clone()
    }

    fn call(&self, op: &'static str) -> ProviderResult<parking_lot::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock();
        inner.calls.push(op);
        if inner.failing.contains(op) {
            return Err(ProviderError::Api {
                code: "InjectedFailure".to_owned(),
                message: format!("{op} was told to fail"),
            });
        }
        if let Some(left) = inner.lagging.get_mut(&op).filter(|left| **left > 0) {
            *left -= 1;
            return Err(ProviderError::NotFound(format!("{op}: not visible yet")));
        }
        Ok(inner)
    }
}

#[async_trait]
impl NetworkApi for FakeNetwork {
    async fn account_id(&self, _region: &Region) -> ProviderResult<String> {
        self.call("account_id")?;
        Ok(ACCOUNT_ID.to_owned())
    }

    async fn create_vpc(&self, region: &Region, _name: &str, _cidr: &str) -> ProviderResult<String> {
        let mut inner = self.call("create_vpc")?;
        let vpc = inner.insert("vpc", Resource::new(region, "pending").then(&["available"]));
        let mut main = Resource::new(region, "available").refs(&[&vpc]);
        main.cascade = true;
        main.main = true;
        inner.insert("rtb", main);
        Ok(vpc)
    }

    async fn vpc_state(&self, region: &Region, vpc_id: &str) -> ProviderResult<String> {
        self.call("vpc_state")?.describe(region, vpc_id)
    }

    async fn delete_vpc(&self, region: &Region, vpc_id: &str) -> ProviderResult<()> {
        self.call("delete_vpc")?.delete(region, vpc_id)
    }

    async fn create_subnet(
        &self,
        region: &Region,
        _name: &str,
        vpc_id: &str,
        _cidr: &str,
        _availability_zone: Option<&str>,
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_subnet")?;
        inner.require(region, &[vpc_id])?;
        Ok(inner.insert("subnet", Resource::new(region, "available").refs(&[vpc_id])))
    }

    async fn delete_subnet(&self, region: &Region, subnet_id: &str) -> ProviderResult<()> {
        self.call("delete_subnet")?.delete(region, subnet_id)
    }

    async fn create_internet_gateway(&self, region: &Region, _name: &str) -> ProviderResult<String> {
        let mut inner = self.call("create_internet_gateway")?;
        Ok(inner.insert("igw", Resource::new(region, "available")))
    }

    async fn attach_internet_gateway(
        &self,
        region: &Region,
        igw_id: &str,
        vpc_id: &str,
    ) -> ProviderResult<()> {
        let mut inner = self.call("attach_internet_gateway")?;
        inner.require(region, &[vpc_id])?;
        let igw = inner.live(region, igw_id)?;
        if !igw.refs.is_empty() {
            return Err(ProviderError::AlreadyExists(format!(
                "{igw_id} is already attached"
            )));
        }
        igw.refs.push(vpc_id.to_owned());
        Ok(())
    }

    async fn delete_internet_gateway(&self, region: &Region, igw_id: &str) -> ProviderResult<()> {
        let mut inner = self.call("delete_internet_gateway")?;
        inner.live(region, igw_id)?.refs.clear();
        inner.delete(region, igw_id)
    }

    async fn main_route_table(&self, region: &Region, vpc_id: &str) -> ProviderResult<String> {
        let mut inner = self.call("main_route_table")?;
        inner.require(region, &[vpc_id])?;
        inner
            .resources
            .iter()
            .find(|(_, r)| r.main && !r.gone() && r.refs.first().map(String::as_str) == Some(vpc_id))
            .map(|(id, _)| id.clone())
            .ok_or_else(|| not_found(vpc_id))
    }

    async fn is_main_route_table(
        &self,
        region: &Region,
        route_table_id: &str,
    ) -> ProviderResult<bool> {
        let mut inner = self.call("is_main_route_table")?;
        Ok(inner.live(region, route_table_id)?.main)
    }

    async fn create_route_table(
        &self,
        region: &Region,
        _name: &str,
        vpc_id: &str,
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_route_table")?;
        inner.require(region, &[vpc_id])?;
        Ok(inner.insert("rtb", Resource::new(region, "available").refs(&[vpc_id])))
    }

    async fn associate_route_table(
        &self,
        region: &Region,
        route_table_id: &str,
        subnet_id: &str,
    ) -> ProviderResult<String> {
        let mut inner = self.call("associate_route_table")?;
        inner.require(region, &[subnet_id])?;
        let table = inner.live(region, route_table_id)?;
        if table.associations.iter().any(|s| s == subnet_id) {
            return Err(ProviderError::AlreadyExists(format!(
                "{subnet_id} is already associated with {route_table_id}"
            )));
        }
        table.associations.push(subnet_id.to_owned());
        Ok(format!("rtbassoc-{subnet_id}"))
    }

    async fn create_route(
        &self,
        region: &Region,
        route_table_id: &str,
        destination_cidr: &str,
        target: &RouteTarget,
    ) -> ProviderResult<()> {
        let mut inner = self.call("create_route")?;
        let target_id = match target {
            RouteTarget::InternetGateway(id) | RouteTarget::TransitGateway(id) => id.as_str(),
        };
        inner.require(region, &[target_id])?;
        let table = inner.live(region, route_table_id)?;
        if table.routes.iter().any(|(dest, _)| dest == destination_cidr) {
            return Err(ProviderError::AlreadyExists(format!(
                "route {destination_cidr} already exists in {route_table_id}"
            )));
        }
        table
            .routes
            .push((destination_cidr.to_owned(), target_id.to_owned()));
        Ok(())
    }

    async fn delete_route_table(&self, region: &Region, route_table_id: &str) -> ProviderResult<()> {
        let mut inner = self.call("delete_route_table")?;
        let table = inner.live(region, route_table_id)?;
        if table.main || !table.associations.is_empty() {
            return Err(ProviderError::DependencyViolation(format!(
                "{route_table_id} is main or still associated"
            )));
        }
        inner.delete(region, route_table_id)
    }

    async fn create_transit_gateway(
        &self,
        region: &Region,
        _name: &str,
        amazon_side_asn: i64,
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_transit_gateway")?;
        let mut tgw = Resource::new(region, "pending").then(&["available"]);
        tgw.asn = Some(amazon_side_asn);
        let tgw_id = inner.insert("tgw", tgw);
        let mut default_table = Resource::new(region, "available").refs(&[&tgw_id]);
        default_table.cascade = true;
        let table_id = inner.insert("tgw-rtb", default_table);
        if let Some(tgw) = inner.resources.get_mut(&tgw_id) {
            tgw.default_route_table = Some(table_id);
        }
        Ok(tgw_id)
    }

    async fn describe_transit_gateway(
        &self,
        region: &Region,
        tgw_id: &str,
    ) -> ProviderResult<TransitGatewayStatus> {
        let mut inner = self.call("describe_transit_gateway")?;
        let state = inner.describe(region, tgw_id)?;
        let default_route_table_id = inner
            .resources
            .get(tgw_id)
            .filter(|_| state == "available")
            .and_then(|r| r.default_route_table.clone());
        Ok(TransitGatewayStatus {
            state,
            default_route_table_id,
        })
    }

    async fn delete_transit_gateway(&self, region: &Region, tgw_id: &str) -> ProviderResult<()> {
        self.call("delete_transit_gateway")?.delete(region, tgw_id)
    }

    async fn create_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        _name: &str,
        tgw_id: &str,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_transit_gateway_vpc_attachment")?;
        inner.require(region, &[tgw_id, vpc_id])?;
        let mut refs = vec![tgw_id, vpc_id];
        for subnet in subnet_ids {
            inner.require(region, &[subnet])?;
            refs.push(subnet.as_str());
        }
        let attachment = Resource::new(region, "pending")
            .then(&["available"])
            .refs(&refs);
        Ok(inner.insert("tgw-attach", attachment))
    }

    async fn delete_transit_gateway_vpc_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        let mut inner = self.call("delete_transit_gateway_vpc_attachment")?;
        let attachment = inner.live(region, attachment_id)?;
        attachment.state = "deleting".to_owned();
        attachment.pending = VecDeque::from(["deleted".to_owned()]);
        inner.deleted.push(attachment_id.to_owned());
        Ok(())
    }

    async fn create_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        request: &PeeringRequest,
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_transit_gateway_peering_attachment")?;
        inner.require(region, &[&request.transit_gateway_id])?;
        inner.require(&request.peer_region, &[&request.peer_transit_gateway_id])?;
        if request.peer_account_id != ACCOUNT_ID {
            return Err(ProviderError::Api {
                code: "InvalidParameterValue".to_owned(),
                message: format!("unknown account {}", request.peer_account_id),
            });
        }
        let mut peering = Resource::new(region, "initiatingRequest")
            .then(&["pendingAcceptance"])
            .refs(&[&request.transit_gateway_id, &request.peer_transit_gateway_id]);
        peering.peer_region = Some(request.peer_region.clone());
        Ok(inner.insert("tgw-attach", peering))
    }

    async fn accept_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        let mut inner = self.call("accept_transit_gateway_peering_attachment")?;
        let peering = inner.live(region, attachment_id)?;
        if peering.peer_region.as_ref() != Some(region) || peering.state != "pendingAcceptance" {
            return Err(ProviderError::Api {
                code: "InvalidTransitGatewayAttachmentID.NotPendingAcceptance".to_owned(),
                message: format!("{attachment_id} cannot be accepted from {region}"),
            });
        }
        peering.state = "pending".to_owned();
        peering.pending = VecDeque::from(["available".to_owned()]);
        Ok(())
    }

    async fn delete_transit_gateway_peering_attachment(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        let mut inner = self.call("delete_transit_gateway_peering_attachment")?;
        let peering = inner.live(region, attachment_id)?;
        peering.state = "deleting".to_owned();
        peering.pending = VecDeque::from(["deleted".to_owned()]);
        inner.deleted.push(attachment_id.to_owned());
        Ok(())
    }

    async fn transit_gateway_attachment_state(
        &self,
        region: &Region,
        attachment_id: &str,
    ) -> ProviderResult<String> {
        self.call("transit_gateway_attachment_state")?
            .describe(region, attachment_id)
    }

    async fn create_transit_gateway_route(
        &self,
        region: &Region,
        tgw_route_table_id: &str,
        destination_cidr: &str,
        attachment_id: &str,
    ) -> ProviderResult<()> {
        let mut inner = self.call("create_transit_gateway_route")?;
        inner.require(region, &[attachment_id])?;
        let table = inner.live(region, tgw_route_table_id)?;
        if table.routes.iter().any(|(dest, _)| dest == destination_cidr) {
            return Err(ProviderError::AlreadyExists(format!(
                "route {destination_cidr} already exists in {tgw_route_table_id}"
            )));
        }
        table
            .routes
            .push((destination_cidr.to_owned(), attachment_id.to_owned()));
        Ok(())
    }

    async fn create_security_group(
        &self,
        region: &Region,
        _name: &str,
        _description: &str,
        vpc_id: &str,
    ) -> ProviderResult<String> {
        let mut inner = self.call("create_security_group")?;
        inner.require(region, &[vpc_id])?;
        Ok(inner.insert("sg", Resource::new(region, "available").refs(&[vpc_id])))
    }

    async fn authorize_security_group_ingress(
        &self,
        region: &Region,
        group_id: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<()> {
        let mut inner = self.call("authorize_security_group_ingress")?;
        let group = inner.live(region, group_id)?;
        if rules.iter().any(|rule| group.rules.contains(rule)) {
            return Err(ProviderError::AlreadyExists(format!(
                "the specified rule already exists in {group_id}"
            )));
        }
        group.rules.extend_from_slice(rules);
        Ok(())
    }

    async fn delete_security_group(&self, region: &Region, group_id: &str) -> ProviderResult<()> {
        self.call("delete_security_group")?.delete(region, group_id)
    }

    async fn run_instance(&self, region: &Region, spec: &InstanceSpec) -> ProviderResult<String> {
        let mut inner = self.call("run_instance")?;
        inner.require(region, &[&spec.subnet_id, &spec.security_group_id])?;
        let mut instance = Resource::new(region, "pending")
            .then(&["running"])
            .refs(&[&spec.subnet_id, &spec.security_group_id]);
        instance.instance = Some(spec.clone());
        Ok(inner.insert("i", instance))
    }

    async fn instance_state(&self, region: &Region, instance_id: &str) -> ProviderResult<String> {
        self.call("instance_state")?.describe(region, instance_id)
    }

    async fn terminate_instance(&self, region: &Region, instance_id: &str) -> ProviderResult<()> {
        let mut inner = self.call("terminate_instance")?;
        let instance = inner.live(region, instance_id)?;
        instance.state = "shutting-down".to_owned();
        instance.pending = VecDeque::from(["terminated".to_owned()]);
        inner.deleted.push(instance_id.to_owned());
        Ok(())
    }
}
