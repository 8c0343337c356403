//! Dependency-ordered teardown of everything recorded for a scenario.
//!
//! Entries are classified into [`ResourceKind`]s and deleted in
//! [`ResourceKind::teardown_rank`] order. Instances and attachments are
//! deleted asynchronously by the provider, so teardown waits for them to be
//! gone before touching what they reference.
//!
//! An entry leaves the store only once its resource is confirmed deleted (or
//! the provider no longer knows it). Failed entries stay recorded so a later
//! `cleanup` run can retry them.

use tracing::{info, warn};

use crate::error::{ProviderError, ProviderResult, TransitNetResult};
use crate::poll::{PollSettings, wait_for_state};
use crate::provider::NetworkApi;
use crate::state::{ResourceRecord, ResourceStore};
use crate::types::{Region, ResourceKind};

/// One entry scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    /// Logical name (store key).
    pub name: String,
    /// Recorded ID and region.
    pub record: ResourceRecord,
    /// Classified kind.
    pub kind: ResourceKind,
}

/// Order `entries` for deletion.
///
/// Returns the classified entries sorted by teardown rank (stable, so
/// entries of the same kind keep their input order) and the names of
/// entries that could not be classified.
#[must_use]
pub fn plan_teardown(
    entries: impl IntoIterator<Item = (String, ResourceRecord)>,
) -> (Vec<PlannedDeletion>, Vec<String>) {
    let mut planned = Vec::new();
    let mut unclassified = Vec::new();

    for (name, record) in entries {
        match ResourceKind::classify(&name, &record.id) {
            Some(kind) => planned.push(PlannedDeletion { name, record, kind }),
            None => unclassified.push(name),
        }
    }

    planned.sort_by_key(|p| p.kind.teardown_rank());
    (planned, unclassified)
}

/// Result of a teardown run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Entries whose resource was deleted or was already gone.
    pub deleted: Vec<String>,
    /// Entries dropped without a delete call (main route tables, gateway
    /// route tables).
    pub skipped: Vec<String>,
    /// Entries whose deletion failed, with the error message. Still recorded.
    pub failed: Vec<(String, String)>,
    /// Entries of unknown kind. Still recorded.
    pub unclassified: Vec<String>,
}

impl TeardownReport {
    /// Whether nothing was left behind.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unclassified.is_empty()
    }
}

enum Disposition {
    Deleted,
    Skipped,
}

/// Deletes everything recorded in a [`ResourceStore`].
#[derive(Debug)]
pub struct Teardown<'a, P: ?Sized> {
    api: &'a P,
    store: &'a ResourceStore,
    default_region: Region,
    poll: PollSettings,
}

impl<'a, P: NetworkApi + ?Sized> Teardown<'a, P> {
    /// Create a teardown. Records without a region are deleted in
    /// `default_region`.
    pub fn new(
        api: &'a P,
        store: &'a ResourceStore,
        default_region: Region,
        poll: PollSettings,
    ) -> Self {
        Self {
            api,
            store,
            default_region,
            poll,
        }
    }

    /// Delete every recorded resource.
    ///
    /// Individual failures do not abort the run; they are logged and
    /// reported. Only store I/O errors are returned as `Err`.
    pub async fn run(&self) -> TransitNetResult<TeardownReport> {
        let (planned, unclassified) = plan_teardown(self.store.entries());
        let mut report = TeardownReport {
            unclassified,
            ..TeardownReport::default()
        };

        for name in &report.unclassified {
            warn!(name = %name, "cannot tell what kind of resource this is, leaving it recorded");
        }
        info!(
            path = %self.store.path().display(),
            resources = planned.len(),
            "starting teardown"
        );

        for entry in planned {
            let region = entry.record.region_or(&self.default_region).clone();
            match self.delete(&entry, &region).await {
                Ok(Disposition::Deleted) => {
                    self.store.remove(&entry.name)?;
                    info!(name = %entry.name, id = %entry.record.id, kind = entry.kind.label(), "deleted");
                    report.deleted.push(entry.name);
                }
                Ok(Disposition::Skipped) => {
                    self.store.remove(&entry.name)?;
                    info!(name = %entry.name, id = %entry.record.id, kind = entry.kind.label(), "removed with its parent");
                    report.skipped.push(entry.name);
                }
                Err(e) if e.is_not_found() => {
                    self.store.remove(&entry.name)?;
                    info!(name = %entry.name, id = %entry.record.id, kind = entry.kind.label(), "already gone");
                    report.deleted.push(entry.name);
                }
                Err(e) => {
                    warn!(
                        name = %entry.name,
                        id = %entry.record.id,
                        kind = entry.kind.label(),
                        error = %e,
                        "failed to delete, keeping it recorded"
                    );
                    report.failed.push((entry.name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn delete(
        &self,
        entry: &PlannedDeletion,
        region: &Region,
    ) -> TransitNetResult<Disposition> {
        let api = self.api;
        let id = entry.record.id.as_str();

        match entry.kind {
            ResourceKind::Instance => {
                api.terminate_instance(region, id).await?;
                wait_for_state("instance", id, &["terminated"], self.poll, move || async move {
                    gone_as(api.instance_state(region, id).await, "terminated")
                })
                .await?;
            }
            ResourceKind::TransitGatewayVpcAttachment => {
                api.delete_transit_gateway_vpc_attachment(region, id).await?;
                self.wait_for_detach(region, id).await?;
            }
            ResourceKind::TransitGatewayPeeringAttachment => {
                api.delete_transit_gateway_peering_attachment(region, id)
                    .await?;
                self.wait_for_detach(region, id).await?;
            }
            ResourceKind::TransitGatewayRouteTable => return Ok(Disposition::Skipped),
            ResourceKind::TransitGateway => api.delete_transit_gateway(region, id).await?,
            ResourceKind::SecurityGroup => api.delete_security_group(region, id).await?,
            ResourceKind::Subnet => api.delete_subnet(region, id).await?,
            ResourceKind::RouteTable => {
                if api.is_main_route_table(region, id).await? {
                    return Ok(Disposition::Skipped);
                }
                api.delete_route_table(region, id).await?;
            }
            ResourceKind::InternetGateway => api.delete_internet_gateway(region, id).await?,
            ResourceKind::Vpc => api.delete_vpc(region, id).await?,
        }
        Ok(Disposition::Deleted)
    }

    async fn wait_for_detach(&self, region: &Region, id: &str) -> TransitNetResult<()> {
        let api = self.api;
        wait_for_state("transit gateway attachment", id, &["deleted"], self.poll, move || async move {
            gone_as(api.transit_gateway_attachment_state(region, id).await, "deleted")
        })
        .await?;
        Ok(())
    }
}

/// A resource the provider no longer knows counts as being in `state`.
fn gone_as(result: ProviderResult<String>, state: &str) -> ProviderResult<String> {
    match result {
        Err(ProviderError::NotFound(_)) => Ok(state.to_owned()),
        other => other,
    }
}
