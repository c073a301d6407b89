use std::sync::atomic::{AtomicBool, Ordering};

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use yansi::Paint;

use crate::error::ProvisionError;

static SILENT: AtomicBool = AtomicBool::new(false);

/// Service error codes worth retrying: throttling, server-side failures and
/// the eventual consistency window right after a resource is created.
const RETRYABLE_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "InternalError",
    "InternalFailure",
    "Unavailable",
    "ServiceUnavailable",
    "InvalidSpotInstanceRequestID.NotFound",
    "InvalidInstanceID.NotFound",
];

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

fn log_output(msg: String) {
    if !SILENT.load(Ordering::Relaxed) {
        println!("{}", msg);
    }
}

pub fn is_retryable_code(code: &str) -> bool {
    RETRYABLE_CODES.contains(&code)
}

/// Echo the AWS CLI equivalent of an EC2 call before it is sent.
pub fn log_request(command: &str, args: &[(&str, String)]) {
    let mut parts = Vec::new();
    parts.push(Paint::new("aws ec2").fg(yansi::Color::Green).bold().to_string());
    parts.push(Paint::new(command).fg(yansi::Color::Yellow).bold().to_string());
    for (flag, value) in args {
        parts.push(format!(
            "{} {}",
            Paint::new(format!("--{}", flag)).fg(yansi::Color::Magenta),
            Paint::new(format!("'{}'", value.replace('\'', "'\\''"))).fg(yansi::Color::Cyan)
        ));
    }
    log_output(format!("Request:\n{}", parts.join(" ")));
}

pub fn log_response(summary: &str) {
    // Grayed out color (dimmed/dark gray)
    log_output(format!("Response:\n{}", Paint::new(summary).rgb(100, 100, 100)));
}

/// Convert an SDK failure into a [`ProvisionError::Api`], deciding whether
/// the same call may be retried.
pub fn api_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProvisionError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
    let transport = matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    );
    let retryable = transport || code.as_deref().map(is_retryable_code).unwrap_or(false);
    let message = err
        .as_service_error()
        .and_then(|e| e.message())
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    tracing::debug!(operation, ?code, retryable, "EC2 call failed: {}", message);
    ProvisionError::Api {
        operation,
        code,
        message,
        retryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_consistency_codes_are_retryable() {
        assert!(is_retryable_code("RequestLimitExceeded"));
        assert!(is_retryable_code("InvalidSpotInstanceRequestID.NotFound"));
        assert!(!is_retryable_code("UnauthorizedOperation"));
        assert!(!is_retryable_code("InvalidParameterValue"));
    }
}
