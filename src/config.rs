use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

// Default configuration constants
pub const DEFAULT_CONFIG_PATH: &str = "ec2-dev.json";
pub const DEFAULT_INSTANCE_TYPE: &str = "r4.xlarge";
pub const DEFAULT_PROFILE: &str = "dev";
pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_IAM_INSTANCE_PROFILE: &str = "EMR_EC2_DefaultRole";
pub const DEFAULT_USER_DATA_FILE: &str = "user_data.sh";
pub const DEFAULT_USER_DATA: &[u8] = b"#!/bin/bash\nsudo apt update -y\n";
pub const DEFAULT_PRICE_PREMIUM_PERCENT: u32 = 5;
pub const MAX_PRICE_PREMIUM_PERCENT: u32 = 1_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_POLL_MAX_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_ADDRESS_ATTEMPTS: u32 = 5;
pub const DEFAULT_ADDRESS_INTERVAL_MS: u64 = 500;
pub const DEFAULT_CANCEL_ATTEMPTS: u32 = 5;
pub const DEFAULT_CANCEL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_CANCEL_MAX_BACKOFF_MS: u64 = 8_000;

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

/// Static configuration record, loaded once from a JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "AWSCLI_Profile", default = "default_profile")]
    pub profile: String,
    #[serde(rename = "Region", default = "default_region")]
    pub region: String,
    #[serde(rename = "User_Data", default)]
    pub user_data: Option<UserDataSource>,
    #[serde(rename = "Volume_Size")]
    pub volume_size: i32,
    #[serde(rename = "AMI_Id")]
    pub ami_id: String,
    #[serde(rename = "Key_Name")]
    pub key_name: String,
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    /// Value of the `Name` tag applied to the instance.
    #[serde(rename = "Name")]
    pub display_name: String,
    #[serde(rename = "Iam_Instance_Profile", default = "default_iam_instance_profile")]
    pub iam_instance_profile: String,
    #[serde(rename = "Price_Premium_Percent", default = "default_price_premium")]
    pub price_premium_percent: u32,
    #[serde(rename = "Interruption_Behavior", default)]
    pub interruption_behavior: InterruptionBehavior,
    #[serde(rename = "Request_Type", default)]
    pub request_type: RequestType,
    #[serde(rename = "Discovery", default)]
    pub discovery: DiscoveryFilters,
    #[serde(rename = "Polling", default)]
    pub polling: PollingConfig,
    #[serde(rename = "Address", default)]
    pub address: AddressConfig,
    #[serde(rename = "Cancel", default)]
    pub cancel: CancelConfig,
}

/// Where the instance startup script comes from.
///
/// `true` reads `user_data.sh` from the working directory, a string names
/// the file to read, `false` keeps the built-in default script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserDataSource {
    Enabled(bool),
    Path(PathBuf),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptionBehavior {
    #[default]
    Stop,
    Terminate,
    Hibernate,
}

impl InterruptionBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterruptionBehavior::Stop => "stop",
            InterruptionBehavior::Terminate => "terminate",
            InterruptionBehavior::Hibernate => "hibernate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestType {
    #[default]
    Persistent,
    OneTime,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Persistent => "persistent",
            RequestType::OneTime => "one-time",
        }
    }
}

/// Name filters used to locate the target network resources.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryFilters {
    #[serde(rename = "Vpc_Name_Patterns", default = "default_vpc_patterns")]
    pub vpc_name_patterns: Vec<String>,
    #[serde(rename = "Subnet_Name_Contains", default = "default_subnet_marker")]
    pub subnet_name_contains: String,
    #[serde(rename = "Security_Group_Name_Contains", default = "default_security_group_markers")]
    pub security_group_name_contains: Vec<String>,
}

impl Default for DiscoveryFilters {
    fn default() -> Self {
        Self {
            vpc_name_patterns: default_vpc_patterns(),
            subnet_name_contains: default_subnet_marker(),
            security_group_name_contains: default_security_group_markers(),
        }
    }
}

/// Spot request polling. A backoff factor of 1.0 keeps a fixed interval;
/// no timeout means poll until the request settles.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(rename = "Interval_Ms", default = "default_poll_interval")]
    pub interval_ms: u64,
    #[serde(rename = "Backoff_Factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(rename = "Max_Interval_Ms", default = "default_poll_max_interval")]
    pub max_interval_ms: u64,
    #[serde(rename = "Timeout_Secs", default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff_factor: 1.0,
            max_interval_ms: DEFAULT_POLL_MAX_INTERVAL_MS,
            timeout_secs: None,
        }
    }
}

impl PollingConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressConfig {
    #[serde(rename = "Attempts", default = "default_address_attempts")]
    pub attempts: u32,
    #[serde(rename = "Interval_Ms", default = "default_address_interval")]
    pub interval_ms: u64,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ADDRESS_ATTEMPTS,
            interval_ms: DEFAULT_ADDRESS_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelConfig {
    #[serde(rename = "Max_Attempts", default = "default_cancel_attempts")]
    pub max_attempts: u32,
    #[serde(rename = "Initial_Backoff_Ms", default = "default_cancel_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(rename = "Max_Backoff_Ms", default = "default_cancel_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for CancelConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CANCEL_ATTEMPTS,
            initial_backoff_ms: DEFAULT_CANCEL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_CANCEL_MAX_BACKOFF_MS,
        }
    }
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_iam_instance_profile() -> String {
    DEFAULT_IAM_INSTANCE_PROFILE.to_string()
}

fn default_price_premium() -> u32 {
    DEFAULT_PRICE_PREMIUM_PERCENT
}

fn default_vpc_patterns() -> Vec<String> {
    vec!["dsci*".to_string(), "DSCI*".to_string()]
}

fn default_subnet_marker() -> String {
    "public".to_string()
}

fn default_security_group_markers() -> Vec<String> {
    vec!["http".to_string(), "ssh".to_string()]
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_poll_max_interval() -> u64 {
    DEFAULT_POLL_MAX_INTERVAL_MS
}

fn default_address_attempts() -> u32 {
    DEFAULT_ADDRESS_ATTEMPTS
}

fn default_address_interval() -> u64 {
    DEFAULT_ADDRESS_INTERVAL_MS
}

fn default_cancel_attempts() -> u32 {
    DEFAULT_CANCEL_ATTEMPTS
}

fn default_cancel_backoff() -> u64 {
    DEFAULT_CANCEL_BACKOFF_MS
}

fn default_cancel_max_backoff() -> u64 {
    DEFAULT_CANCEL_MAX_BACKOFF_MS
}

impl Config {
    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration document already held in memory.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.volume_size <= 0 {
            return Err(invalid("Volume_Size", format!("must be a positive number of GB, got {}", self.volume_size)));
        }
        for (field, value) in [
            ("AWSCLI_Profile", &self.profile),
            ("Region", &self.region),
            ("AMI_Id", &self.ami_id),
            ("Key_Name", &self.key_name),
            ("Project", &self.project),
            ("Owner", &self.owner),
            ("Name", &self.display_name),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty".to_string()));
            }
        }
        if self.price_premium_percent > MAX_PRICE_PREMIUM_PERCENT {
            return Err(invalid(
                "Price_Premium_Percent",
                format!("must be at most {}, got {}", MAX_PRICE_PREMIUM_PERCENT, self.price_premium_percent),
            ));
        }
        if self.discovery.vpc_name_patterns.is_empty() {
            return Err(invalid("Vpc_Name_Patterns", "at least one pattern is required".to_string()));
        }
        if self.polling.interval_ms == 0 {
            return Err(invalid("Interval_Ms", "must be greater than zero".to_string()));
        }
        if self.polling.backoff_factor.is_nan() || self.polling.backoff_factor < 1.0 {
            return Err(invalid("Backoff_Factor", format!("must be at least 1.0, got {}", self.polling.backoff_factor)));
        }
        if self.address.attempts == 0 {
            return Err(invalid("Attempts", "at least one address lookup is required".to_string()));
        }
        if self.cancel.max_attempts == 0 {
            return Err(invalid("Max_Attempts", "at least one cancel attempt is required".to_string()));
        }
        Ok(())
    }

    /// Raw bytes of the startup script passed to the instance.
    pub fn user_data_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        self.user_data_bytes_in(Path::new("."))
    }

    /// Like [`Config::user_data_bytes`], resolving relative script paths
    /// against `base_dir` instead of the working directory.
    pub fn user_data_bytes_in(&self, base_dir: &Path) -> Result<Vec<u8>, ConfigError> {
        let path = match &self.user_data {
            None | Some(UserDataSource::Enabled(false)) => return Ok(DEFAULT_USER_DATA.to_vec()),
            Some(UserDataSource::Enabled(true)) => base_dir.join(DEFAULT_USER_DATA_FILE),
            Some(UserDataSource::Path(p)) => base_dir.join(p),
        };
        fs::read(&path).map_err(|source| ConfigError::UserData { path, source })
    }

    /// The `Project`, `Owner` and `Name` tags applied to a new instance.
    pub fn instance_tags(&self) -> Vec<(String, String)> {
        vec![
            ("Project".to_string(), self.project.clone()),
            ("Owner".to_string(), self.owner.clone()),
            ("Name".to_string(), self.display_name.clone()),
        ]
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
