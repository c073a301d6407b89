use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::{AwsEc2, Ec2Api};
use crate::config::Config;
use crate::error::ProvisionError;
use crate::models::{
    cheapest_unix_first, NetworkContext, PriceQuote, Resolution, SpotRequestSpec, SpotRequestStatus, Teardown,
};
use crate::services::discovery::discover_network;
use crate::utils::{encode_user_data, Backoff};

/// Acquires, inspects and releases a single spot instance.
///
/// Holds the session and the network resources resolved at construction for
/// the lifetime of the process.
pub struct Provisioner<A> {
    api: A,
    config: Config,
    network: NetworkContext,
    /// Base64 startup script, read once at construction.
    user_data: String,
}

impl Provisioner<AwsEc2> {
    /// Open an AWS session for the configured profile and region, then
    /// resolve the network context.
    pub async fn connect(config: Config) -> Result<Self, ProvisionError> {
        let api = AwsEc2::connect(&config.profile, &config.region).await;
        Self::new(api, config).await
    }
}

impl<A: Ec2Api> Provisioner<A> {
    pub async fn new(api: A, config: Config) -> Result<Self, ProvisionError> {
        let user_data = encode_user_data(&config.user_data_bytes()?);
        let network = discover_network(&api, &config.discovery).await?;
        info!(
            vpc_id = %network.vpc_id,
            zones = network.subnets.len(),
            security_group = %network.security_group_id,
            "Network context resolved"
        );
        Ok(Self {
            api,
            config,
            network,
            user_data,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Current UNIX spot prices for `instance_type`, cheapest first.
    pub async fn spot_prices(&self, instance_type: &str) -> Result<Vec<PriceQuote>, ProvisionError> {
        let quotes = cheapest_unix_first(self.api.spot_price_history(instance_type).await?);
        debug!(instance_type, rows = quotes.len(), "Spot price table");
        Ok(quotes)
    }

    /// Launch specification for one instance of `instance_type` in `zone`.
    pub fn launch_spec(
        &self,
        instance_type: &str,
        spot_price: &str,
        availability_zone: &str,
    ) -> Result<SpotRequestSpec, ProvisionError> {
        let subnet_id = self
            .network
            .subnet_for(availability_zone)
            .ok_or_else(|| ProvisionError::UnknownZone(availability_zone.to_string()))?;

        Ok(SpotRequestSpec {
            instance_type: instance_type.to_string(),
            spot_price: spot_price.to_string(),
            availability_zone: availability_zone.to_string(),
            subnet_id: subnet_id.to_string(),
            security_group_id: self.network.security_group_id.clone(),
            image_id: self.config.ami_id.clone(),
            key_name: self.config.key_name.clone(),
            iam_instance_profile: self.config.iam_instance_profile.clone(),
            volume_size: self.config.volume_size,
            user_data: self.user_data.clone(),
            request_type: self.config.request_type,
            interruption_behavior: self.config.interruption_behavior,
        })
    }

    /// Submit a spot request and return its id.
    pub async fn request_spot_instance(
        &self,
        instance_type: &str,
        spot_price: &str,
        availability_zone: &str,
    ) -> Result<String, ProvisionError> {
        let spec = self.launch_spec(instance_type, spot_price, availability_zone)?;
        let request_id = self.api.request_spot_instance(&spec).await?;
        info!(%request_id, instance_type, spot_price, availability_zone, "Spot request submitted");
        Ok(request_id)
    }

    /// Poll a spot request until it has an instance or reports that no
    /// capacity is available.
    ///
    /// `on_status` sees every status observed. Transient API errors are
    /// retried; the wait is unbounded unless `Polling.Timeout_Secs` is set.
    pub async fn resolve_instance<F>(&self, request_id: &str, mut on_status: F) -> Result<Resolution, ProvisionError>
    where
        F: FnMut(&SpotRequestStatus),
    {
        let polling = &self.config.polling;
        let backoff = Backoff {
            initial: Duration::from_millis(polling.interval_ms),
            factor: polling.backoff_factor,
            max: Duration::from_millis(polling.max_interval_ms),
        };
        let timeout = polling.timeout();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            sleep(backoff.delay(attempt)).await;
            attempt = attempt.saturating_add(1);

            match self.api.describe_spot_request(request_id).await {
                Ok(status) => {
                    on_status(&status);
                    if status.capacity_not_available() {
                        info!(request_id, "Capacity not available for spot request");
                        return Ok(Resolution::CapacityNotAvailable);
                    }
                    if let Some(instance_id) = status.instance_id {
                        info!(request_id, %instance_id, "Spot request fulfilled");
                        return Ok(Resolution::Fulfilled(instance_id));
                    }
                    debug!(request_id, attempt, status = ?status.status_code, "Spot request still pending");
                }
                Err(e) if e.is_retryable() => {
                    warn!(request_id, attempt, %e, "Transient error while polling spot request");
                }
                Err(e) => return Err(e),
            }

            if let Some(limit) = timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(ProvisionError::Timeout {
                        request_id: request_id.to_string(),
                        waited,
                    });
                }
            }
        }
    }

    /// Apply the Project, Owner and Name tags. Reports failure as `false`
    /// without retrying.
    pub async fn tag_instance(&self, instance_id: &str) -> bool {
        match self.api.create_tags(instance_id, &self.config.instance_tags()).await {
            Ok(()) => {
                info!(instance_id, "Instance tagged");
                true
            }
            Err(e) => {
                warn!(instance_id, %e, "Failed to tag instance");
                false
            }
        }
    }

    /// Public address of the instance, or an empty string if none was
    /// assigned within `Address.Attempts` lookups.
    pub async fn public_ip_address(&self, instance_id: &str) -> Result<String, ProvisionError> {
        let attempts = self.config.address.attempts;
        let interval = Duration::from_millis(self.config.address.interval_ms);

        for attempt in 1..=attempts {
            match self.api.describe_instance(instance_id).await {
                Ok(Some(instance)) => match instance.public_ip {
                    Some(ip) if !ip.is_empty() => return Ok(ip),
                    _ => debug!(instance_id, attempt, "Public IP not assigned yet"),
                },
                Ok(None) => debug!(instance_id, attempt, "Instance not visible yet"),
                Err(e) if e.is_retryable() => warn!(instance_id, attempt, %e, "Transient error looking up public IP"),
                Err(e) => return Err(e),
            }
            if attempt < attempts {
                sleep(interval).await;
            }
        }

        warn!(instance_id, attempts, "No public IP address after all attempts");
        Ok(String::new())
    }

    /// Cancel the spot request and terminate its instance if it survived the
    /// cancellation.
    pub async fn cancel_spot_request(&self, request_id: &str) -> Result<Teardown, ProvisionError> {
        let cancel = &self.config.cancel;
        let backoff = Backoff::exponential(
            Duration::from_millis(cancel.initial_backoff_ms),
            Duration::from_millis(cancel.max_backoff_ms),
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.api.cancel_spot_request(request_id).await {
                Ok(()) => break,
                Err(e) if e.is_retryable() && attempt < cancel.max_attempts => {
                    warn!(request_id, attempt, %e, "Cancel failed, retrying");
                    sleep(backoff.delay(attempt - 1)).await;
                }
                Err(e) if e.is_retryable() => {
                    warn!(request_id, attempt, %e, "Cancel failed, giving up");
                    return Err(ProvisionError::RetriesExhausted {
                        operation: "CancelSpotInstanceRequests",
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        info!(request_id, "Spot request cancelled");

        let status = self.api.describe_spot_request(request_id).await?;
        let still_running = status.instance_still_running();
        match status.instance_id {
            Some(instance_id) if still_running => {
                let state = self.api.terminate_instance(&instance_id).await?;
                info!(request_id, %instance_id, state = ?state, "Instance terminated");
                Ok(Teardown::Terminated { instance_id, state })
            }
            _ => {
                debug!(request_id, status = ?status.status_code, "Nothing left to terminate");
                Ok(Teardown::AlreadyTornDown {
                    status_code: status.status_code,
                })
            }
        }
    }
}
