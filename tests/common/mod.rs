//! Scripted EC2 double shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use getspot::api::Ec2Api;
use getspot::config::Config;
use getspot::models::{
    InstanceView, PriceQuote, SecurityGroupSummary, SpotRequestSpec, SpotRequestStatus, SubnetSummary, VpcSummary,
};
use getspot::ProvisionError;

/// One scripted reply. The last reply in a queue repeats forever.
#[derive(Clone, Debug)]
pub enum Reply<T> {
    Ok(T),
    Transient,
    Permanent,
}

pub fn transient(operation: &'static str) -> ProvisionError {
    ProvisionError::Api {
        operation,
        code: Some("RequestLimitExceeded".to_string()),
        message: "Request limit exceeded.".to_string(),
        retryable: true,
    }
}

pub fn permanent(operation: &'static str) -> ProvisionError {
    ProvisionError::Api {
        operation,
        code: Some("UnauthorizedOperation".to_string()),
        message: "You are not authorized to perform this operation.".to_string(),
        retryable: false,
    }
}

fn next<T: Clone>(queue: &Mutex<VecDeque<Reply<T>>>, operation: &'static str) -> Result<T, ProvisionError> {
    let mut queue = queue.lock().unwrap();
    let reply = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    match reply {
        Some(Reply::Ok(v)) => Ok(v),
        Some(Reply::Transient) => Err(transient(operation)),
        Some(Reply::Permanent) => Err(permanent(operation)),
        None => panic!("unscripted call to {operation}"),
    }
}

pub struct MockEc2 {
    pub vpcs: Vec<VpcSummary>,
    pub subnets: Vec<SubnetSummary>,
    pub groups: Vec<SecurityGroupSummary>,
    pub prices: Vec<PriceQuote>,
    pub request_id: String,
    pub statuses: Mutex<VecDeque<Reply<SpotRequestStatus>>>,
    pub instances: Mutex<VecDeque<Reply<Option<InstanceView>>>>,
    pub cancels: Mutex<VecDeque<Reply<()>>>,
    pub tags: Mutex<VecDeque<Reply<()>>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub submitted: Mutex<Vec<SpotRequestSpec>>,
    pub applied_tags: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub terminated: Mutex<Vec<String>>,
}

impl MockEc2 {
    /// One `dsci` VPC with public subnets in eu-west-1a and eu-west-1b, a
    /// private subnet in eu-west-1c and an HTTP+SSH security group.
    pub fn new() -> Self {
        Self {
            vpcs: vec![vpc("vpc-1", "dsci-dev")],
            subnets: vec![
                subnet("subnet-a", "eu-west-1a", Some("dsci-public-1a")),
                subnet("subnet-b", "eu-west-1b", Some("dsci-Public-1b")),
                subnet("subnet-c", "eu-west-1c", Some("dsci-private-1c")),
                subnet("subnet-x", "eu-west-1c", None),
            ],
            groups: vec![
                group("sg-default", "default"),
                group("sg-web", "dsci-http-ssh"),
                group("sg-http", "dsci-http-only"),
            ],
            prices: vec![
                PriceQuote::new("eu-west-1b", 0.1010, "Linux/UNIX"),
                PriceQuote::new("eu-west-1a", 0.0834, "Linux/UNIX"),
                PriceQuote::new("eu-west-1a", 0.0500, "Windows"),
                PriceQuote::new("eu-west-1c", 0.0950, "Linux/UNIX (Amazon VPC)"),
            ],
            request_id: "sir-1".to_string(),
            statuses: Mutex::new(VecDeque::new()),
            instances: Mutex::new(VecDeque::new()),
            cancels: Mutex::new(VecDeque::from([Reply::Ok(())])),
            tags: Mutex::new(VecDeque::from([Reply::Ok(())])),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            applied_tags: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(self, replies: Vec<Reply<SpotRequestStatus>>) -> Self {
        *self.statuses.lock().unwrap() = replies.into();
        self
    }

    pub fn with_instances(self, replies: Vec<Reply<Option<InstanceView>>>) -> Self {
        *self.instances.lock().unwrap() = replies.into();
        self
    }

    pub fn with_cancels(self, replies: Vec<Reply<()>>) -> Self {
        *self.cancels.lock().unwrap() = replies.into();
        self
    }

    pub fn with_tags(self, replies: Vec<Reply<()>>) -> Self {
        *self.tags.lock().unwrap() = replies.into();
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == operation).count()
    }

    fn record(&self, operation: &'static str) {
        self.calls.lock().unwrap().push(operation);
    }
}

pub fn vpc(id: &str, name: &str) -> VpcSummary {
    VpcSummary {
        id: id.to_string(),
        name: Some(name.to_string()),
    }
}

pub fn subnet(id: &str, zone: &str, name: Option<&str>) -> SubnetSummary {
    SubnetSummary {
        id: id.to_string(),
        availability_zone: zone.to_string(),
        name: name.map(str::to_string),
    }
}

pub fn group(id: &str, name: &str) -> SecurityGroupSummary {
    SecurityGroupSummary {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn status(code: &str, instance_id: Option<&str>) -> SpotRequestStatus {
    SpotRequestStatus {
        request_id: "sir-1".to_string(),
        state: Some("open".to_string()),
        status_code: Some(code.to_string()),
        status_message: None,
        instance_id: instance_id.map(str::to_string),
    }
}

pub fn instance(ip: Option<&str>) -> InstanceView {
    InstanceView {
        id: "i-1".to_string(),
        state: Some("running".to_string()),
        public_ip: ip.map(str::to_string),
    }
}

pub const BASE_CONFIG: &str = r#"{
    "AWSCLI_Profile": "dev",
    "Volume_Size": 50,
    "AMI_Id": "ami-123",
    "Key_Name": "mykey",
    "Project": "churn",
    "Owner": "data-science",
    "Name": "churn-notebook"
}"#;

pub fn test_config() -> Config {
    Config::from_json(BASE_CONFIG).unwrap()
}

/// Base config with extra top-level keys merged in.
pub fn config_with(extra: serde_json::Value) -> Config {
    let mut base: serde_json::Value = serde_json::from_str(BASE_CONFIG).unwrap();
    if let (Some(obj), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    Config::from_json(&base.to_string()).unwrap()
}

#[async_trait]
impl Ec2Api for MockEc2 {
    async fn find_vpcs(&self, _name_patterns: &[String]) -> Result<Vec<VpcSummary>, ProvisionError> {
        self.record("DescribeVpcs");
        Ok(self.vpcs.clone())
    }

    async fn list_subnets(&self, vpc_id: &str) -> Result<Vec<SubnetSummary>, ProvisionError> {
        self.record("DescribeSubnets");
        assert_eq!(vpc_id, self.vpcs[0].id);
        Ok(self.subnets.clone())
    }

    async fn list_security_groups(&self, _vpc_id: &str) -> Result<Vec<SecurityGroupSummary>, ProvisionError> {
        self.record("DescribeSecurityGroups");
        Ok(self.groups.clone())
    }

    async fn spot_price_history(&self, _instance_type: &str) -> Result<Vec<PriceQuote>, ProvisionError> {
        self.record("DescribeSpotPriceHistory");
        Ok(self.prices.clone())
    }

    async fn request_spot_instance(&self, spec: &SpotRequestSpec) -> Result<String, ProvisionError> {
        self.record("RequestSpotInstances");
        self.submitted.lock().unwrap().push(spec.clone());
        Ok(self.request_id.clone())
    }

    async fn describe_spot_request(&self, _request_id: &str) -> Result<SpotRequestStatus, ProvisionError> {
        self.record("DescribeSpotInstanceRequests");
        next(&self.statuses, "DescribeSpotInstanceRequests")
    }

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<(), ProvisionError> {
        self.record("CreateTags");
        next(&self.tags, "CreateTags")?;
        self.applied_tags
            .lock()
            .unwrap()
            .push((resource_id.to_string(), tags.to_vec()));
        Ok(())
    }

    async fn describe_instance(&self, _instance_id: &str) -> Result<Option<InstanceView>, ProvisionError> {
        self.record("DescribeInstances");
        next(&self.instances, "DescribeInstances")
    }

    async fn cancel_spot_request(&self, _request_id: &str) -> Result<(), ProvisionError> {
        self.record("CancelSpotInstanceRequests");
        next(&self.cancels, "CancelSpotInstanceRequests")
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<Option<String>, ProvisionError> {
        self.record("TerminateInstances");
        self.terminated.lock().unwrap().push(instance_id.to_string());
        Ok(Some("shutting-down".to_string()))
    }
}
