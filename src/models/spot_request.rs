use crate::config::{InterruptionBehavior, RequestType};
use crate::utils::format_status;

/// Status code EC2 reports when no spare capacity exists for the request.
pub const CAPACITY_NOT_AVAILABLE: &str = "capacity-not-available";

/// Status code of a cancelled request whose instance is still up.
pub const CANCELED_INSTANCE_RUNNING: &str = "request-canceled-and-instance-running";

/// Snapshot of a spot request as returned by describe-spot-instance-requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpotRequestStatus {
    pub request_id: String,
    /// Lifecycle state: open, active, closed, cancelled or failed.
    pub state: Option<String>,
    /// Detailed status code, e.g. `pending-evaluation` or `fulfilled`.
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    pub instance_id: Option<String>,
}

impl SpotRequestStatus {
    pub fn capacity_not_available(&self) -> bool {
        self.status_code.as_deref() == Some(CAPACITY_NOT_AVAILABLE)
    }

    pub fn instance_still_running(&self) -> bool {
        self.status_code.as_deref() == Some(CANCELED_INSTANCE_RUNNING)
    }

    /// Status label plus EC2's explanation, for progress output.
    pub fn progress_label(&self) -> String {
        let code = self.status_code.as_deref().map(format_status).unwrap_or_default();
        match self.status_message.as_deref() {
            Some(message) if !message.is_empty() => format!("{}: {}", code, message),
            _ => code,
        }
    }
}

/// Outcome of waiting on a spot request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Fulfilled(String),
    CapacityNotAvailable,
}

/// Everything needed to submit a single-instance spot request.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotRequestSpec {
    pub instance_type: String,
    /// Price ceiling, already formatted with two decimals.
    pub spot_price: String,
    pub availability_zone: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub image_id: String,
    pub key_name: String,
    pub iam_instance_profile: String,
    pub volume_size: i32,
    /// Base64-encoded startup script.
    pub user_data: String,
    pub request_type: RequestType,
    pub interruption_behavior: InterruptionBehavior,
}
