/// Error types for configuration loading and provisioning
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading the configuration record.
///
/// All of these are fatal and surface before any remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or misses a required key
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A key is present but its value is unusable
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The startup script referenced by `User_Data` could not be read
    #[error("Failed to read startup script {path}: {source}")]
    UserData {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while acquiring or releasing a spot instance
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A discovery filter matched zero or several resources
    #[error("Expected exactly one {resource} to match, found {count}")]
    Discovery { resource: &'static str, count: usize },

    /// No public subnet is known for the requested availability zone
    #[error("No public subnet known for availability zone '{0}'")]
    UnknownZone(String),

    /// No UNIX spot price was published for the instance type
    #[error("No Linux/UNIX spot prices found for instance type '{0}'")]
    NoSpotPrices(String),

    /// The EC2 API rejected or failed a call
    #[error("EC2 {operation} failed{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        operation: &'static str,
        code: Option<String>,
        message: String,
        retryable: bool,
    },

    /// A successful response lacked a field the flow depends on
    #[error("EC2 {operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    /// The spot request did not settle within the configured timeout
    #[error("Spot request {request_id} still pending after {}s", .waited.as_secs())]
    Timeout { request_id: String, waited: Duration },

    /// Every attempt of a retried call failed with a transient error
    #[error("EC2 {operation} still failing after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::Api { retryable: true, .. })
    }

    /// Service error code reported by EC2, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProvisionError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
