use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::api::Ec2Api;
use crate::config::DiscoveryFilters;
use crate::error::ProvisionError;
use crate::models::{NetworkContext, SecurityGroupSummary, SubnetSummary};
use crate::utils::{name_contains, name_contains_all};

/// Resolve the VPC, its public subnets and the HTTP+SSH security group.
pub async fn discover_network<A: Ec2Api + ?Sized>(
    api: &A,
    filters: &DiscoveryFilters,
) -> Result<NetworkContext, ProvisionError> {
    let vpc = exactly_one("VPC", api.find_vpcs(&filters.vpc_name_patterns).await?)?;
    info!(vpc_id = %vpc.id, name = ?vpc.name, "Selected VPC");

    let subnets = public_subnets(api.list_subnets(&vpc.id).await?, &filters.subnet_name_contains);
    if subnets.is_empty() {
        warn!(vpc_id = %vpc.id, marker = %filters.subnet_name_contains, "No matching public subnets in VPC");
    }

    let group = select_security_group(
        api.list_security_groups(&vpc.id).await?,
        &filters.security_group_name_contains,
    )?;
    info!(group_id = %group.id, name = %group.name, "Selected security group");

    Ok(NetworkContext {
        vpc_id: vpc.id,
        subnets,
        security_group_id: group.id,
    })
}

/// Unwrap a filter result that must contain a single resource.
pub fn exactly_one<T>(resource: &'static str, mut items: Vec<T>) -> Result<T, ProvisionError> {
    match items.len() {
        1 => Ok(items.remove(0)),
        count => Err(ProvisionError::Discovery { resource, count }),
    }
}

/// Zone to subnet-id table of the subnets whose `Name` tag contains `marker`.
///
/// Untagged subnets are skipped. When a zone has several matches the last
/// one listed wins.
pub fn public_subnets(subnets: Vec<SubnetSummary>, marker: &str) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();
    for subnet in subnets {
        let Some(name) = subnet.name.as_deref() else {
            debug!(subnet_id = %subnet.id, "Skipping subnet without Name tag");
            continue;
        };
        if !name_contains(name, marker) {
            continue;
        }
        if let Some(previous) = table.insert(subnet.availability_zone.clone(), subnet.id.clone()) {
            warn!(zone = %subnet.availability_zone, %previous, replacement = %subnet.id, "Several public subnets in one zone");
        }
    }
    table
}

pub fn select_security_group(
    groups: Vec<SecurityGroupSummary>,
    markers: &[String],
) -> Result<SecurityGroupSummary, ProvisionError> {
    let matching: Vec<SecurityGroupSummary> = groups
        .into_iter()
        .filter(|g| name_contains_all(&g.name, markers))
        .collect();
    exactly_one("security group", matching)
}
