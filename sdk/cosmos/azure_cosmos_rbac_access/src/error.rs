// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Error types for settings, credentials and store operations.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use azure_core::error::ErrorKind;
use azure_core::http::{headers::Headers, RawResponse};
use azure_data_cosmos::constants;
use serde::Deserialize;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while loading or validating settings. These are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The settings file could not be read.
    #[error("unable to read settings file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not a JSON object of the expected shape.
    #[error("settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A setting required by the selected mode is missing or empty.
    #[error("required setting '{0}' is missing or empty")]
    MissingSetting(&'static str),

    /// A setting is present but cannot be used.
    #[error("setting '{key}' has an invalid value '{value}': {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid(
        key: &'static str,
        value: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::InvalidSetting {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Details reported by the service alongside an unsuccessful response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// HTTP status code.
    pub status: u16,

    /// Cosmos DB sub-status code (`x-ms-substatus`), if any.
    pub sub_status: Option<u32>,

    /// Correlation id (`x-ms-activity-id`) for service-side diagnostics.
    pub activity_id: Option<String>,

    /// Request units charged for the failed request.
    pub request_charge: f64,

    /// How long the service asked the client to back off (`x-ms-retry-after-ms`).
    pub retry_after: Option<Duration>,

    /// The `message` field of the error body, if the service sent one.
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl Diagnostics {
    fn from_response(status: u16, error_code: Option<&str>, response: Option<&RawResponse>) -> Self {
        let Some(response) = response else {
            return Self {
                status,
                message: error_code.map(str::to_string),
                ..Default::default()
            };
        };
        let headers = response.headers();
        let message = serde_json::from_slice::<ErrorBody>(response.body())
            .ok()
            .and_then(|body| body.message)
            .or_else(|| error_code.map(str::to_string));
        Self {
            status,
            sub_status: headers
                .get_optional_str(&constants::SUB_STATUS)
                .and_then(|v| v.trim().parse().ok()),
            activity_id: headers
                .get_optional_str(&constants::ACTIVITY_ID)
                .map(str::to_string),
            request_charge: headers
                .get_optional_str(&constants::REQUEST_CHARGE)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_default(),
            retry_after: retry_after(headers),
            message,
        }
    }
}

/// Parses `x-ms-retry-after-ms`. Values that are not a finite, non-negative number of
/// milliseconds representable as a [`Duration`] are ignored.
fn retry_after(headers: &Headers) -> Option<Duration> {
    let millis: f64 = headers
        .get_optional_str(&constants::RETRY_AFTER_MS)?
        .trim()
        .parse()
        .ok()?;
    if millis.is_sign_negative() {
        return None;
    }
    Duration::try_from_secs_f64(millis / 1000.0).ok()
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(sub_status) = self.sub_status {
            write!(f, "/{}", sub_status)?;
        }
        if let Some(activity_id) = &self.activity_id {
            write!(f, ", activity id {}", activity_id)?;
        }
        if let Some(message) = &self.message {
            write!(f, ", {}", message)?;
        }
        Ok(())
    }
}

/// Errors raised by a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document, container or database does not exist.
    #[error("resource not found ({0})")]
    NotFound(Diagnostics),

    /// A document with the same id already exists in the partition.
    #[error("resource already exists ({0})")]
    Conflict(Diagnostics),

    /// The request was rate limited and the client's own throttling retries are exhausted.
    #[error("request rate is too large ({0})")]
    Throttled(Diagnostics),

    /// Any other unsuccessful response, for example 401 or 403.
    #[error("request failed ({0})")]
    Service(Diagnostics),

    /// The request never produced a response.
    #[error("connectivity failure: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No access token could be acquired for the request.
    #[error("credential unavailable: {0}")]
    Credential(String),

    /// The request could not be built or the client rejected it before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A request or response body could not be (de)serialized.
    #[error("unable to (de)serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Maps an unsuccessful response onto the error taxonomy.
    pub(crate) fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        match diagnostics.status {
            404 => Self::NotFound(diagnostics),
            409 => Self::Conflict(diagnostics),
            429 => Self::Throttled(diagnostics),
            _ => Self::Service(diagnostics),
        }
    }

    fn connectivity(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connectivity {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Service diagnostics, when the failure came from a response.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::NotFound(d) | Self::Conflict(d) | Self::Throttled(d) | Self::Service(d) => {
                Some(d)
            }
            _ => None,
        }
    }

    /// Request units charged for the failed request, zero when nothing was charged.
    pub fn request_charge(&self) -> f64 {
        self.diagnostics().map_or(0.0, |d| d.request_charge)
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.diagnostics().and_then(|d| d.activity_id.as_deref())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<azure_core::Error> for StoreError {
    fn from(error: azure_core::Error) -> Self {
        match error.kind() {
            ErrorKind::HttpResponse {
                status,
                error_code,
                raw_response,
            } => Self::from_diagnostics(Diagnostics::from_response(
                u16::from(*status),
                error_code.as_deref(),
                raw_response.as_deref(),
            )),
            ErrorKind::Connection | ErrorKind::Io => Self::connectivity(error),
            ErrorKind::Credential => Self::Credential(error.to_string()),
            ErrorKind::DataConversion => match error.into_downcast::<serde_json::Error>() {
                Ok(error) => Self::Serialization(error),
                Err(error) => Self::InvalidRequest(error.to_string()),
            },
            _ => Self::InvalidRequest(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_core::http::StatusCode;

    fn diagnostics(status: u16) -> Diagnostics {
        Diagnostics {
            status,
            activity_id: Some("a1".into()),
            request_charge: 1.24,
            ..Default::default()
        }
    }

    fn http_error(status: u16, headers: &[(&str, &str)], body: &'static str) -> azure_core::Error {
        let mut response_headers = Headers::new();
        for (name, value) in headers {
            response_headers.insert(name.to_string(), value.to_string());
        }
        ErrorKind::HttpResponse {
            status: StatusCode::from(status),
            error_code: Some("Forbidden".into()),
            raw_response: Some(Box::new(RawResponse::from_bytes(
                StatusCode::from(status),
                response_headers,
                body,
            ))),
        }
        .into_error()
    }

    fn retry_after_of(value: &str) -> Option<Duration> {
        let error = http_error(429, &[("x-ms-retry-after-ms", value)], "{}");
        StoreError::from(error).diagnostics().and_then(|d| d.retry_after)
    }

    #[test]
    fn status_codes_map_to_variants() {
        assert!(matches!(
            StoreError::from_diagnostics(diagnostics(404)),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from_diagnostics(diagnostics(409)),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            StoreError::from_diagnostics(diagnostics(429)),
            StoreError::Throttled(_)
        ));
        assert!(matches!(
            StoreError::from_diagnostics(diagnostics(403)),
            StoreError::Service(_)
        ));
    }

    #[test]
    fn failures_keep_charge_and_activity_id() {
        let err = StoreError::from_diagnostics(diagnostics(404));
        assert_eq!(err.request_charge(), 1.24);
        assert_eq!(err.activity_id(), Some("a1"));

        let err = StoreError::Credential("no token".into());
        assert_eq!(err.request_charge(), 0.0);
        assert!(err.activity_id().is_none());
    }

    #[test]
    fn diagnostics_display_includes_sub_status_and_message() {
        let d = Diagnostics {
            status: 403,
            sub_status: Some(5301),
            message: Some("principal lacks readMetadata".into()),
            ..Default::default()
        };
        assert_eq!(d.to_string(), "status 403/5301, principal lacks readMetadata");
    }

    #[test]
    fn http_errors_carry_service_diagnostics() {
        let error = http_error(
            403,
            &[
                ("x-ms-substatus", "5301"),
                ("x-ms-activity-id", "act-403"),
                ("x-ms-request-charge", "1.24"),
            ],
            r#"{"code":"Forbidden","message":"principal lacks readMetadata"}"#,
        );
        let error = StoreError::from(error);
        let StoreError::Service(d) = &error else {
            panic!("expected a service error, got {error:?}");
        };
        assert_eq!(d.status, 403);
        assert_eq!(d.sub_status, Some(5301));
        assert_eq!(d.message.as_deref(), Some("principal lacks readMetadata"));
        assert_eq!(error.request_charge(), 1.24);
        assert_eq!(error.activity_id(), Some("act-403"));
    }

    #[test]
    fn error_code_stands_in_for_a_missing_body() {
        let error = StoreError::from(http_error(404, &[], ""));
        assert!(error.is_not_found());
        assert_eq!(
            error.diagnostics().and_then(|d| d.message.as_deref()),
            Some("Forbidden")
        );

        let bare = ErrorKind::HttpResponse {
            status: StatusCode::Conflict,
            error_code: None,
            raw_response: None,
        }
        .into_error();
        assert!(matches!(StoreError::from(bare), StoreError::Conflict(_)));
    }

    #[test]
    fn throttled_errors_keep_the_retry_hint() {
        assert_eq!(retry_after_of("12.5"), Some(Duration::from_micros(12_500)));
        assert_eq!(retry_after_of(" 0 "), Some(Duration::ZERO));
        assert!(matches!(
            StoreError::from(http_error(429, &[], "{}")),
            StoreError::Throttled(_)
        ));
    }

    #[test]
    fn unusable_retry_hints_are_ignored() {
        for value in ["inf", "-inf", "NaN", "1e300", "-5", "-0", "soon", ""] {
            assert_eq!(retry_after_of(value), None, "{value}");
        }
    }

    #[test]
    fn client_side_errors_map_by_kind() {
        let error = azure_core::Error::with_message(ErrorKind::Io, "connection reset");
        assert!(matches!(
            StoreError::from(error),
            StoreError::Connectivity { .. }
        ));

        let error = azure_core::Error::with_message(ErrorKind::Credential, "no token");
        assert!(matches!(StoreError::from(error), StoreError::Credential(m) if m == "no token"));

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            StoreError::from(azure_core::Error::from(json)),
            StoreError::Serialization(_)
        ));

        let error = azure_core::Error::with_message(ErrorKind::Other, "bad partition key");
        assert!(matches!(StoreError::from(error), StoreError::InvalidRequest(_)));
    }
}
