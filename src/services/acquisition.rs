use tracing::warn;

use crate::api::Ec2Api;
use crate::error::ProvisionError;
use crate::models::{Reservation, Resolution, SpotRequestStatus, Teardown};
use crate::services::pricing::Bid;
use crate::services::provisioner::Provisioner;

/// Shown when EC2 has no spare capacity for the requested type.
pub const CAPACITY_NOT_AVAILABLE_NOTICE: &str = "Capacity is not available for spot request. Try other instance type!";

/// Result of placing a bid and waiting for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// The instance is up; `tagged` is false if tagging failed.
    Ready { reservation: Reservation, tagged: bool },
    /// EC2 had no capacity; the request was cancelled again.
    CapacityNotAvailable { request_id: String, teardown: Teardown },
}

impl Acquisition {
    /// Message for the user when the acquisition did not produce an instance.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Acquisition::Ready { .. } => None,
            Acquisition::CapacityNotAvailable { .. } => Some(CAPACITY_NOT_AVAILABLE_NOTICE),
        }
    }
}

/// Submit `bid`, wait for the instance, tag it and look up its address.
///
/// When no capacity is available or the wait times out the request is
/// cancelled before returning, so no persistent request is left behind.
pub async fn acquire<A, F>(
    provisioner: &Provisioner<A>,
    instance_type: &str,
    bid: &Bid,
    on_request: impl FnOnce(&str),
    on_status: F,
) -> Result<Acquisition, ProvisionError>
where
    A: Ec2Api,
    F: FnMut(&SpotRequestStatus),
{
    let request_id = provisioner
        .request_spot_instance(instance_type, &bid.spot_price, &bid.availability_zone)
        .await?;
    on_request(&request_id);

    let instance_id = match provisioner.resolve_instance(&request_id, on_status).await {
        Ok(Resolution::Fulfilled(instance_id)) => instance_id,
        Ok(Resolution::CapacityNotAvailable) => {
            let teardown = provisioner.cancel_spot_request(&request_id).await?;
            return Ok(Acquisition::CapacityNotAvailable { request_id, teardown });
        }
        Err(e @ ProvisionError::Timeout { .. }) => {
            warn!(%request_id, "Giving up on spot request, cancelling it");
            if let Err(cancel_err) = provisioner.cancel_spot_request(&request_id).await {
                warn!(%request_id, %cancel_err, "Cancel after timeout failed");
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let tagged = provisioner.tag_instance(&instance_id).await;
    let public_ip = provisioner.public_ip_address(&instance_id).await?;

    Ok(Acquisition::Ready {
        reservation: Reservation {
            instance_type: instance_type.to_string(),
            request_id,
            instance_id,
            public_ip,
        },
        tagged,
    })
}
