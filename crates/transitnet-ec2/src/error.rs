//! Mapping of SDK errors onto [`ProviderError`].

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use transitnet_core::ProviderError;

/// Classify an EC2 error code.
///
/// `*.NotFound` codes become [`ProviderError::NotFound`], so teardown can
/// treat them as already deleted. Codes reporting that an association,
/// route or rule is already in place become [`ProviderError::AlreadyExists`].
#[must_use]
pub fn classify_error_code(code: &str, message: &str) -> ProviderError {
    match code {
        "DependencyViolation" => ProviderError::DependencyViolation(message.to_owned()),
        "Resource.AlreadyAssociated" | "RouteAlreadyExists" | "InvalidPermission.Duplicate" => {
            ProviderError::AlreadyExists(format!("{code}: {message}"))
        }
        c if c.ends_with("NotFound") => ProviderError::NotFound(format!("{code}: {message}")),
        _ => ProviderError::Api {
            code: code.to_owned(),
            message: message.to_owned(),
        },
    }
}

/// Convert any SDK error into a [`ProviderError`].
pub(crate) fn sdk_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err.code() {
        Some(code) => classify_error_code(code, err.message().unwrap_or_default()),
        None => ProviderError::Other(anyhow::anyhow!("{}", DisplayErrorContext(&err))),
    }
}
