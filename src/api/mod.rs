//! Boundary to the EC2 API.
//!
//! The provisioner only talks to EC2 through [`Ec2Api`], so the whole
//! acquisition flow can run against a scripted double in tests.

pub mod client;
pub mod ec2;

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::models::{
    InstanceView, PriceQuote, SecurityGroupSummary, SpotRequestSpec, SpotRequestStatus, SubnetSummary, VpcSummary,
};

pub use client::{set_silent, is_retryable_code};
pub use ec2::AwsEc2;

#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// VPCs whose `Name` tag matches any of the given wildcard patterns.
    async fn find_vpcs(&self, name_patterns: &[String]) -> Result<Vec<VpcSummary>, ProvisionError>;

    async fn list_subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>, ProvisionError>;

    async fn list_security_groups(&self, vpc_id: &str) -> Result<Vec<SecurityGroupSummary>, ProvisionError>;

    /// Current spot prices for `instance_type`, every zone and product.
    async fn spot_price_history(&self, instance_type: &str) -> Result<Vec<PriceQuote>, ProvisionError>;

    /// Submit a spot request and return its id.
    async fn request_spot_instance(&self, spec: &SpotRequestSpec) -> Result<String, ProvisionError>;

    async fn describe_spot_request(&self, request_id: &str) -> Result<SpotRequestStatus, ProvisionError>;

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<(), ProvisionError>;

    /// `Ok(None)` when the instance is not visible yet.
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceView>, ProvisionError>;

    async fn cancel_spot_request(&self, request_id: &str) -> Result<(), ProvisionError>;

    /// Terminate an instance and return the state EC2 reports for it.
    async fn terminate_instance(&self, instance_id: &str) -> Result<Option<String>, ProvisionError>;
}
