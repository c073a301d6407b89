use std::collections::BTreeMap;

/// A VPC returned by the name-tag filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpcSummary {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetSummary {
    pub id: String,
    pub availability_zone: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupSummary {
    pub id: String,
    pub name: String,
}

/// Network resources resolved once at startup and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkContext {
    pub vpc_id: String,
    /// Availability zone to public subnet id.
    pub subnets: BTreeMap<String, String>,
    pub security_group_id: String,
}

impl NetworkContext {
    pub fn subnet_for(&self, availability_zone: &str) -> Option<&str> {
        self.subnets.get(availability_zone).map(String::as_str)
    }

    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.subnets.keys().map(String::as_str)
    }
}
