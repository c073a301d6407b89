/// Tests for discovery, pricing and the spot request lifecycle
mod common;

use common::*;
use getspot::config::{InterruptionBehavior, RequestType};
use getspot::models::{Resolution, Teardown};
use getspot::services::{acquire, plan_bid, Acquisition, Provisioner};
use getspot::ProvisionError;

async fn provisioner(mock: MockEc2) -> Provisioner<MockEc2> {
    Provisioner::new(mock, test_config()).await.unwrap()
}

#[tokio::test]
async fn test_discovery_builds_network_context() {
    let p = provisioner(MockEc2::new()).await;
    let network = p.network();

    assert_eq!(network.vpc_id, "vpc-1");
    assert_eq!(network.security_group_id, "sg-web");
    assert_eq!(network.subnet_for("eu-west-1a"), Some("subnet-a"));
    assert_eq!(network.subnet_for("eu-west-1b"), Some("subnet-b"));
    // private and untagged subnets are left out
    assert_eq!(network.subnet_for("eu-west-1c"), None);
    assert_eq!(network.zones().count(), 2);
}

#[tokio::test]
async fn test_discovery_fails_without_vpc() {
    let mut mock = MockEc2::new();
    mock.vpcs.clear();

    match Provisioner::new(mock, test_config()).await {
        Err(ProvisionError::Discovery { resource, count }) => {
            assert_eq!(resource, "VPC");
            assert_eq!(count, 0);
        }
        other => panic!("expected discovery error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_discovery_fails_with_two_vpcs() {
    let mut mock = MockEc2::new();
    mock.vpcs.push(vpc("vpc-2", "DSCI-prod"));

    let err = Provisioner::new(mock, test_config()).await.err().unwrap();
    assert!(matches!(err, ProvisionError::Discovery { resource: "VPC", count: 2 }));
}

#[tokio::test]
async fn test_discovery_fails_with_ambiguous_security_group() {
    let mut mock = MockEc2::new();
    mock.groups.push(group("sg-web-2", "legacy-ssh-http"));

    let err = Provisioner::new(mock, test_config()).await.err().unwrap();
    assert!(matches!(
        err,
        ProvisionError::Discovery {
            resource: "security group",
            count: 2
        }
    ));
}

#[tokio::test]
async fn test_spot_prices_are_unix_only_and_sorted() {
    let p = provisioner(MockEc2::new()).await;
    let quotes = p.spot_prices("r4.xlarge").await.unwrap();

    assert_eq!(quotes.len(), 3);
    assert!(quotes.iter().all(|q| q.product_description.contains("UNIX")));
    assert!(quotes.windows(2).all(|w| w[0].price <= w[1].price));
    assert_eq!(quotes[0].availability_zone, "eu-west-1a");
    assert_eq!(p.api().count("DescribeSpotPriceHistory"), 1);

    // no caching: every query goes to EC2
    p.spot_prices("r4.xlarge").await.unwrap();
    assert_eq!(p.api().count("DescribeSpotPriceHistory"), 2);
}

#[tokio::test]
async fn test_request_in_cheapest_zone_scenario() {
    let p = provisioner(MockEc2::new()).await;
    let quotes = p.spot_prices("r4.xlarge").await.unwrap();
    let bid = plan_bid(&quotes, None, p.config().price_premium_percent).unwrap();
    assert_eq!(bid.spot_price, "0.09");
    assert_eq!(bid.availability_zone, "eu-west-1a");

    let request_id = p
        .request_spot_instance("r4.xlarge", &bid.spot_price, &bid.availability_zone)
        .await
        .unwrap();
    assert_eq!(request_id, "sir-1");

    let submitted = p.api().submitted.lock().unwrap();
    let spec = &submitted[0];
    assert_eq!(spec.subnet_id, "subnet-a");
    assert_eq!(spec.security_group_id, "sg-web");
    assert_eq!(spec.volume_size, 50);
    assert_eq!(spec.image_id, "ami-123");
    assert_eq!(spec.key_name, "mykey");
    assert_eq!(spec.instance_type, "r4.xlarge");
    assert_eq!(spec.spot_price, "0.09");
    assert_eq!(spec.iam_instance_profile, "EMR_EC2_DefaultRole");
    assert_eq!(spec.request_type, RequestType::Persistent);
    assert_eq!(spec.interruption_behavior, InterruptionBehavior::Stop);
    assert_eq!(spec.user_data, "IyEvYmluL2Jhc2gKc3VkbyBhcHQgdXBkYXRlIC15Cg==");
}

#[tokio::test]
async fn test_request_in_unknown_zone_fails_before_submission() {
    let p = provisioner(MockEc2::new()).await;

    let err = p.request_spot_instance("r4.xlarge", "0.09", "eu-west-1c").await.unwrap_err();
    assert!(matches!(err, ProvisionError::UnknownZone(ref z) if z == "eu-west-1c"));
    assert_eq!(p.api().count("RequestSpotInstances"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_not_available_wins_over_instance_id() {
    let mock = MockEc2::new().with_statuses(vec![
        Reply::Ok(status("pending-evaluation", None)),
        Reply::Ok(status("capacity-not-available", Some("i-1"))),
    ]);
    let p = provisioner(mock).await;

    let mut seen = Vec::new();
    let resolution = p
        .resolve_instance("sir-1", |s| seen.push(s.status_code.clone()))
        .await
        .unwrap();

    assert_eq!(resolution, Resolution::CapacityNotAvailable);
    assert_eq!(seen.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_polling_retries_transient_errors_until_fulfilled() {
    let mock = MockEc2::new().with_statuses(vec![
        Reply::Transient,
        Reply::Ok(status("pending-evaluation", None)),
        Reply::Ok(status("pending-fulfillment", None)),
        Reply::Ok(status("fulfilled", Some("i-1"))),
    ]);
    let p = provisioner(mock).await;

    let resolution = p.resolve_instance("sir-1", |_| {}).await.unwrap();
    assert_eq!(resolution, Resolution::Fulfilled("i-1".to_string()));
    assert_eq!(p.api().count("DescribeSpotInstanceRequests"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_polling_propagates_permanent_errors() {
    let mock = MockEc2::new().with_statuses(vec![Reply::Ok(status("pending-evaluation", None)), Reply::Permanent]);
    let p = provisioner(mock).await;

    let err = p.resolve_instance("sir-1", |_| {}).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.code(), Some("UnauthorizedOperation"));
}

#[tokio::test(start_paused = true)]
async fn test_polling_times_out_when_configured() {
    let mock = MockEc2::new().with_statuses(vec![Reply::Ok(status("pending-evaluation", None))]);
    let config = config_with(serde_json::json!({"Polling": {"Timeout_Secs": 5}}));
    let p = Provisioner::new(mock, config).await.unwrap();

    match p.resolve_instance("sir-1", |_| {}).await {
        Err(ProvisionError::Timeout { request_id, waited }) => {
            assert_eq!(request_id, "sir-1");
            assert!(waited.as_secs() >= 5);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(p.api().count("DescribeSpotInstanceRequests"), 5);
}

#[tokio::test]
async fn test_tag_instance_applies_three_tags() {
    let p = provisioner(MockEc2::new()).await;

    assert!(p.tag_instance("i-1").await);
    let applied = p.api().applied_tags.lock().unwrap();
    assert_eq!(applied.len(), 1);
    let (resource, tags) = &applied[0];
    assert_eq!(resource, "i-1");
    assert_eq!(
        tags,
        &vec![
            ("Project".to_string(), "churn".to_string()),
            ("Owner".to_string(), "data-science".to_string()),
            ("Name".to_string(), "churn-notebook".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_tag_failure_is_reported_without_retry() {
    let p = provisioner(MockEc2::new().with_tags(vec![Reply::Transient])).await;

    assert!(!p.tag_instance("i-1").await);
    assert_eq!(p.api().count("CreateTags"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_address_present_first_time_needs_no_retry() {
    let p = provisioner(MockEc2::new().with_instances(vec![Reply::Ok(Some(instance(Some("52.1.2.3"))))])).await;

    assert_eq!(p.public_ip_address("i-1").await.unwrap(), "52.1.2.3");
    assert_eq!(p.api().count("DescribeInstances"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_address_absent_for_all_attempts_is_empty() {
    let p = provisioner(MockEc2::new().with_instances(vec![Reply::Ok(Some(instance(None)))])).await;

    assert_eq!(p.public_ip_address("i-1").await.unwrap(), "");
    assert_eq!(p.api().count("DescribeInstances"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_address_retries_until_assigned() {
    let mock = MockEc2::new().with_instances(vec![
        Reply::Ok(None),
        Reply::Transient,
        Reply::Ok(Some(instance(None))),
        Reply::Ok(Some(instance(Some("52.1.2.3")))),
    ]);
    let p = provisioner(mock).await;

    assert_eq!(p.public_ip_address("i-1").await.unwrap(), "52.1.2.3");
    assert_eq!(p.api().count("DescribeInstances"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_address_propagates_permanent_errors() {
    let p = provisioner(MockEc2::new().with_instances(vec![Reply::Permanent])).await;

    assert!(p.public_ip_address("i-1").await.is_err());
    assert_eq!(p.api().count("DescribeInstances"), 1);
}

#[tokio::test]
async fn test_cancel_already_cancelled_request_is_idempotent() {
    let mock = MockEc2::new().with_statuses(vec![Reply::Ok(status("canceled-before-fulfillment", None))]);
    let p = provisioner(mock).await;

    let first = p.cancel_spot_request("sir-1").await.unwrap();
    let second = p.cancel_spot_request("sir-1").await.unwrap();

    let expected = Teardown::AlreadyTornDown {
        status_code: Some("canceled-before-fulfillment".to_string()),
    };
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 2);
    assert_eq!(p.api().count("TerminateInstances"), 0);
}

#[tokio::test]
async fn test_cancel_terminates_running_instance() {
    let mock = MockEc2::new().with_statuses(vec![Reply::Ok(status("request-canceled-and-instance-running", Some("i-1")))]);
    let p = provisioner(mock).await;

    let teardown = p.cancel_spot_request("sir-1").await.unwrap();
    assert_eq!(
        teardown,
        Teardown::Terminated {
            instance_id: "i-1".to_string(),
            state: Some("shutting-down".to_string()),
        }
    );
    assert_eq!(*p.api().terminated.lock().unwrap(), vec!["i-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_retries_transient_failures() {
    let mock = MockEc2::new()
        .with_cancels(vec![Reply::Transient, Reply::Transient, Reply::Ok(())])
        .with_statuses(vec![Reply::Ok(status("instance-terminated-by-user", Some("i-1")))]);
    let p = provisioner(mock).await;

    let teardown = p.cancel_spot_request("sir-1").await.unwrap();
    assert!(teardown.terminated_instance().is_none());
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_gives_up_after_max_attempts() {
    let p = provisioner(MockEc2::new().with_cancels(vec![Reply::Transient])).await;

    let err = p.cancel_spot_request("sir-1").await.unwrap_err();
    assert!(matches!(err, ProvisionError::RetriesExhausted { attempts: 5, .. }));
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 5);
    assert_eq!(p.api().count("DescribeSpotInstanceRequests"), 0);
}

#[tokio::test]
async fn test_cancel_permanent_failure_is_not_retried() {
    let p = provisioner(MockEc2::new().with_cancels(vec![Reply::Permanent])).await;

    assert!(p.cancel_spot_request("sir-1").await.is_err());
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_capacity_not_available_cancels_and_stops() {
    let mock = MockEc2::new().with_statuses(vec![
        Reply::Ok(status("pending-evaluation", None)),
        Reply::Ok(status("capacity-not-available", None)),
    ]);
    let p = provisioner(mock).await;
    let quotes = p.spot_prices("r4.xlarge").await.unwrap();
    let bid = plan_bid(&quotes, None, 5).unwrap();

    let outcome = acquire(&p, "r4.xlarge", &bid, |_| {}, |_| {}).await.unwrap();

    assert_eq!(
        outcome.notice(),
        Some("Capacity is not available for spot request. Try other instance type!")
    );
    match outcome {
        Acquisition::CapacityNotAvailable { request_id, teardown } => {
            assert_eq!(request_id, "sir-1");
            assert!(teardown.terminated_instance().is_none());
        }
        other => panic!("expected capacity outcome, got {:?}", other),
    }
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 1);
    assert_eq!(p.api().count("CreateTags"), 0);
    assert_eq!(p.api().count("DescribeInstances"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_fulfilled_tags_and_resolves_address() {
    let mock = MockEc2::new()
        .with_statuses(vec![
            Reply::Ok(status("pending-fulfillment", None)),
            Reply::Ok(status("fulfilled", Some("i-1"))),
        ])
        .with_instances(vec![Reply::Ok(Some(instance(None))), Reply::Ok(Some(instance(Some("52.1.2.3"))))]);
    let p = provisioner(mock).await;
    let quotes = p.spot_prices("r4.xlarge").await.unwrap();
    let bid = plan_bid(&quotes, Some("eu-west-1b"), 5).unwrap();

    let mut announced = None;
    let outcome = acquire(&p, "r4.xlarge", &bid, |id| announced = Some(id.to_string()), |_| {})
        .await
        .unwrap();

    assert_eq!(announced.as_deref(), Some("sir-1"));
    assert_eq!(outcome.notice(), None);
    match outcome {
        Acquisition::Ready { reservation, tagged } => {
            assert!(tagged);
            assert_eq!(reservation.instance_id, "i-1");
            assert_eq!(reservation.public_ip, "52.1.2.3");
            assert_eq!(reservation.ssh_command("mykey"), "ssh -i \"mykey.pem\" ubuntu@52.1.2.3");
        }
        other => panic!("expected ready, got {:?}", other),
    }
    assert_eq!(p.api().submitted.lock().unwrap()[0].subnet_id, "subnet-b");
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_timeout_cancels_request() {
    let mock = MockEc2::new().with_statuses(vec![Reply::Ok(status("pending-evaluation", None))]);
    let config = config_with(serde_json::json!({"Polling": {"Timeout_Secs": 3}}));
    let p = Provisioner::new(mock, config).await.unwrap();
    let bid = plan_bid(&p.spot_prices("r4.xlarge").await.unwrap(), None, 5).unwrap();

    let err = acquire(&p, "r4.xlarge", &bid, |_| {}, |_| {}).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Timeout { .. }));
    assert_eq!(p.api().count("CancelSpotInstanceRequests"), 1);
}
