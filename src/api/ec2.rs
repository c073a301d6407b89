//! [`Ec2Api`] backed by the AWS SDK.

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::primitives::DateTime;
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, Filter, IamInstanceProfileSpecification, InstanceInterruptionBehavior,
    InstanceNetworkInterfaceSpecification, InstanceType, RequestSpotLaunchSpecification,
    RunInstancesMonitoringEnabled, SpotInstanceType, Tag, VolumeType,
};
use aws_sdk_ec2::Client;
use tracing::debug;

use super::client::{api_error, log_request, log_response};
use super::Ec2Api;
use crate::error::ProvisionError;
use crate::models::{
    InstanceView, PriceQuote, SecurityGroupSummary, SpotRequestSpec, SpotRequestStatus, SubnetSummary, VpcSummary,
};
use crate::utils::parse_price;

const ROOT_DEVICE_NAME: &str = "/dev/sda1";

/// EC2 client scoped to one profile and region.
pub struct AwsEc2 {
    client: Client,
}

impl AwsEc2 {
    /// Build a session from the named profile in the shared AWS config files.
    pub async fn connect(profile: &str, region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .region(Region::new(region.to_string()))
            .load()
            .await;

        debug!(profile, region, "AWS session ready");
        Self {
            client: Client::new(&config),
        }
    }
}

fn name_tag(tags: &[Tag]) -> Option<String> {
    tags.iter()
        .find(|t| t.key() == Some("Name"))
        .and_then(|t| t.value())
        .map(|v| v.to_string())
}

fn vpc_filter(vpc_id: &str) -> Filter {
    Filter::builder().name("vpc-id").values(vpc_id).build()
}

#[async_trait]
impl Ec2Api for AwsEc2 {
    async fn find_vpcs(&self, name_patterns: &[String]) -> Result<Vec<VpcSummary>, ProvisionError> {
        log_request(
            "describe-vpcs",
            &[("filters", format!("Name=tag:Name,Values={}", name_patterns.join(",")))],
        );
        let output = self
            .client
            .describe_vpcs()
            .filters(
                Filter::builder()
                    .name("tag:Name")
                    .set_values(Some(name_patterns.to_vec()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| api_error("DescribeVpcs", e))?;

        let vpcs: Vec<VpcSummary> = output
            .vpcs()
            .iter()
            .filter_map(|v| {
                Some(VpcSummary {
                    id: v.vpc_id()?.to_string(),
                    name: name_tag(v.tags()),
                })
            })
            .collect();
        log_response(&format!("{} VPC(s)", vpcs.len()));
        Ok(vpcs)
    }

    async fn list_subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>, ProvisionError> {
        log_request("describe-subnets", &[("filters", format!("Name=vpc-id,Values={}", vpc_id))]);
        let output = self
            .client
            .describe_subnets()
            .filters(vpc_filter(vpc_id))
            .send()
            .await
            .map_err(|e| api_error("DescribeSubnets", e))?;

        let subnets: Vec<SubnetSummary> = output
            .subnets()
            .iter()
            .filter_map(|s| {
                Some(SubnetSummary {
                    id: s.subnet_id()?.to_string(),
                    availability_zone: s.availability_zone()?.to_string(),
                    name: name_tag(s.tags()),
                })
            })
            .collect();
        log_response(&format!("{} subnet(s)", subnets.len()));
        Ok(subnets)
    }

    async fn list_security_groups(&self, vpc_id: &str) -> Result<Vec<SecurityGroupSummary>, ProvisionError> {
        log_request(
            "describe-security-groups",
            &[("filters", format!("Name=vpc-id,Values={}", vpc_id))],
        );
        let output = self
            .client
            .describe_security_groups()
            .filters(vpc_filter(vpc_id))
            .send()
            .await
            .map_err(|e| api_error("DescribeSecurityGroups", e))?;

        let groups: Vec<SecurityGroupSummary> = output
            .security_groups()
            .iter()
            .filter_map(|g| {
                Some(SecurityGroupSummary {
                    id: g.group_id()?.to_string(),
                    name: g.group_name().unwrap_or_default().to_string(),
                })
            })
            .collect();
        log_response(&format!("{} security group(s)", groups.len()));
        Ok(groups)
    }

    async fn spot_price_history(&self, instance_type: &str) -> Result<Vec<PriceQuote>, ProvisionError> {
        let started = SystemTime::now();
        log_request(
            "describe-spot-price-history",
            &[
                ("instance-types", instance_type.to_string()),
                ("start-time", chrono::Utc::now().to_rfc3339()),
            ],
        );

        let mut quotes = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_spot_price_history()
                .instance_types(InstanceType::from(instance_type))
                .start_time(DateTime::from(started))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("DescribeSpotPriceHistory", e))?;

            for row in output.spot_price_history() {
                let (Some(zone), Some(price)) = (row.availability_zone(), parse_price(row.spot_price())) else {
                    debug!(?row, "Skipping incomplete spot price row");
                    continue;
                };
                quotes.push(PriceQuote {
                    availability_zone: zone.to_string(),
                    price,
                    product_description: row
                        .product_description()
                        .map(|d| d.as_str().to_string())
                        .unwrap_or_default(),
                    timestamp: row
                        .timestamp()
                        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        log_response(&format!("{} price row(s)", quotes.len()));
        Ok(quotes)
    }

    async fn request_spot_instance(&self, spec: &SpotRequestSpec) -> Result<String, ProvisionError> {
        log_request(
            "request-spot-instances",
            &[
                ("instance-count", "1".to_string()),
                ("spot-price", spec.spot_price.clone()),
                ("type", spec.request_type.as_str().to_string()),
                ("instance-interruption-behavior", spec.interruption_behavior.as_str().to_string()),
                (
                    "launch-specification",
                    format!(
                        "ImageId={},InstanceType={},KeyName={},SubnetId={},Groups={},VolumeSize={}",
                        spec.image_id,
                        spec.instance_type,
                        spec.key_name,
                        spec.subnet_id,
                        spec.security_group_id,
                        spec.volume_size
                    ),
                ),
            ],
        );

        let network_interface = InstanceNetworkInterfaceSpecification::builder()
            .device_index(0)
            .subnet_id(&spec.subnet_id)
            .groups(&spec.security_group_id)
            .associate_public_ip_address(true)
            .build();
        let root_volume = BlockDeviceMapping::builder()
            .device_name(ROOT_DEVICE_NAME)
            .ebs(
                EbsBlockDevice::builder()
                    .delete_on_termination(true)
                    .volume_size(spec.volume_size)
                    .volume_type(VolumeType::Standard)
                    .build(),
            )
            .build();
        let launch_specification = RequestSpotLaunchSpecification::builder()
            .network_interfaces(network_interface)
            .block_device_mappings(root_volume)
            .ebs_optimized(true)
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .key_name(&spec.key_name)
            .iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .name(&spec.iam_instance_profile)
                    .build(),
            )
            .user_data(&spec.user_data)
            .monitoring(RunInstancesMonitoringEnabled::builder().enabled(true).build())
            .build();

        let output = self
            .client
            .request_spot_instances()
            .instance_count(1)
            .launch_specification(launch_specification)
            .spot_price(&spec.spot_price)
            .r#type(SpotInstanceType::from(spec.request_type.as_str()))
            .instance_interruption_behavior(InstanceInterruptionBehavior::from(spec.interruption_behavior.as_str()))
            .send()
            .await
            .map_err(|e| api_error("RequestSpotInstances", e))?;

        let request_id = output
            .spot_instance_requests()
            .first()
            .and_then(|r| r.spot_instance_request_id())
            .ok_or(ProvisionError::MissingField {
                operation: "RequestSpotInstances",
                field: "SpotInstanceRequestId",
            })?
            .to_string();
        log_response(&format!("SpotInstanceRequestId: {}", request_id));
        Ok(request_id)
    }

    async fn describe_spot_request(&self, request_id: &str) -> Result<SpotRequestStatus, ProvisionError> {
        log_request(
            "describe-spot-instance-requests",
            &[("spot-instance-request-ids", request_id.to_string())],
        );
        let output = self
            .client
            .describe_spot_instance_requests()
            .spot_instance_request_ids(request_id)
            .send()
            .await
            .map_err(|e| api_error("DescribeSpotInstanceRequests", e))?;

        let request = output
            .spot_instance_requests()
            .first()
            .ok_or(ProvisionError::MissingField {
                operation: "DescribeSpotInstanceRequests",
                field: "SpotInstanceRequests",
            })?;
        let status = SpotRequestStatus {
            request_id: request
                .spot_instance_request_id()
                .unwrap_or(request_id)
                .to_string(),
            state: request.state().map(|s| s.as_str().to_string()),
            status_code: request.status().and_then(|s| s.code()).map(|c| c.to_string()),
            status_message: request.status().and_then(|s| s.message()).map(|m| m.to_string()),
            instance_id: request.instance_id().map(|i| i.to_string()),
        };
        log_response(&format!(
            "State: {} Status: {} InstanceId: {}",
            status.state.as_deref().unwrap_or("-"),
            status.status_code.as_deref().unwrap_or("-"),
            status.instance_id.as_deref().unwrap_or("-")
        ));
        Ok(status)
    }

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<(), ProvisionError> {
        let rendered: Vec<String> = tags.iter().map(|(k, v)| format!("Key={},Value={}", k, v)).collect();
        log_request(
            "create-tags",
            &[("resources", resource_id.to_string()), ("tags", rendered.join(" "))],
        );
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(
                tags.iter()
                    .map(|(k, v)| Tag::builder().key(k).value(v).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(|e| api_error("CreateTags", e))?;
        log_response("OK");
        Ok(())
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceView>, ProvisionError> {
        log_request("describe-instances", &[("instance-ids", instance_id.to_string())]);
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| api_error("DescribeInstances", e))?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .map(|i| InstanceView {
                id: i.instance_id().unwrap_or(instance_id).to_string(),
                state: i.state().and_then(|s| s.name()).map(|n| n.as_str().to_string()),
                public_ip: i.public_ip_address().map(|ip| ip.to_string()),
            });
        log_response(&match &instance {
            Some(i) => format!("PublicIpAddress: {}", i.public_ip.as_deref().unwrap_or("-")),
            None => "no reservation".to_string(),
        });
        Ok(instance)
    }

    async fn cancel_spot_request(&self, request_id: &str) -> Result<(), ProvisionError> {
        log_request(
            "cancel-spot-instance-requests",
            &[("spot-instance-request-ids", request_id.to_string())],
        );
        let output = self
            .client
            .cancel_spot_instance_requests()
            .spot_instance_request_ids(request_id)
            .send()
            .await
            .map_err(|e| api_error("CancelSpotInstanceRequests", e))?;

        let state = output
            .cancelled_spot_instance_requests()
            .first()
            .and_then(|c| c.state())
            .map(|s| s.as_str().to_string());
        log_response(&format!("State: {}", state.as_deref().unwrap_or("-")));
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<Option<String>, ProvisionError> {
        log_request("terminate-instances", &[("instance-ids", instance_id.to_string())]);
        let output = self
            .client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| api_error("TerminateInstances", e))?;

        let state = output
            .terminating_instances()
            .first()
            .and_then(|c| c.current_state())
            .and_then(|s| s.name())
            .map(|n| n.as_str().to_string());
        log_response(&format!("CurrentState: {}", state.as_deref().unwrap_or("-")));
        Ok(state)
    }
}
