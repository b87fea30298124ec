//! # Controller Errors
//!
//! The controller reports failures in its response envelope as a wire code such as
//! `api.err.DeviceBusy`. Codes are parsed into [`ErrorCode`] once, at the client, so
//! nothing downstream ever matches on message text.
//!
//! | Wire code | [`ErrorCode`] | Engine signal |
//! |-----------|---------------|---------------|
//! | `api.err.DeviceBusy` | `DeviceBusy` | busy (retry) |
//! | `api.err.ServiceUnavailable` | `ServiceUnavailable` | busy (retry) |
//! | `api.err.NotFound`, `api.err.UnknownDevice` | `NotFound` | not found |
//! | `api.err.InvalidPayload` | `InvalidPayload` | fatal |
//! | `api.err.LoginRequired` | `LoginRequired` | fatal |
//! | anything else | `Other(code)` | fatal |

use crate::model::ServiceState;
use reconcile_engine::{BackendError, BackendSignal, WaitError};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    DeviceBusy,
    ServiceUnavailable,
    NotFound,
    InvalidPayload,
    LoginRequired,
    Other(String),
}

impl ErrorCode {
    pub fn as_wire(&self) -> &str {
        match self {
            ErrorCode::DeviceBusy => "api.err.DeviceBusy",
            ErrorCode::ServiceUnavailable => "api.err.ServiceUnavailable",
            ErrorCode::NotFound => "api.err.NotFound",
            ErrorCode::InvalidPayload => "api.err.InvalidPayload",
            ErrorCode::LoginRequired => "api.err.LoginRequired",
            ErrorCode::Other(code) => code,
        }
    }
}

impl FromStr for ErrorCode {
    type Err = Infallible;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Ok(match code {
            "api.err.DeviceBusy" => ErrorCode::DeviceBusy,
            "api.err.ServiceUnavailable" => ErrorCode::ServiceUnavailable,
            "api.err.NotFound" | "api.err.UnknownDevice" => ErrorCode::NotFound,
            "api.err.InvalidPayload" => ErrorCode::InvalidPayload,
            "api.err.LoginRequired" => ErrorCode::LoginRequired,
            other => ErrorCode::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("controller rejected request ({code}): {message}")]
    Api {
        code: ErrorCode,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("malformed controller response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("controller is not running")]
    Closed,

    #[error("controller dropped the request")]
    Dropped,

    #[error("request abandoned on cancellation")]
    Cancelled,
}

impl ControllerError {
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        ControllerError::Api {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            ControllerError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl BackendError for ControllerError {
    fn signal(&self) -> BackendSignal {
        match self {
            ControllerError::Api {
                code: ErrorCode::DeviceBusy | ErrorCode::ServiceUnavailable,
                retry_after,
                ..
            } => BackendSignal::Busy {
                retry_after: *retry_after,
            },
            ControllerError::Api {
                code: ErrorCode::NotFound,
                ..
            } => BackendSignal::NotFound,
            _ => BackendSignal::Other,
        }
    }
}

/// Failures of the controller harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("controller did not become ready: {0}")]
    NotReady(#[source] WaitError<ServiceState, ControllerError>),

    #[error("controller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_engine::ErrorKind;

    #[test]
    fn wire_codes_parse() {
        assert_eq!("api.err.DeviceBusy".parse::<ErrorCode>(), Ok(ErrorCode::DeviceBusy));
        assert_eq!("api.err.UnknownDevice".parse::<ErrorCode>(), Ok(ErrorCode::NotFound));
        assert_eq!(
            "api.err.NoSiteContext".parse::<ErrorCode>(),
            Ok(ErrorCode::Other("api.err.NoSiteContext".into()))
        );
        assert_eq!(ErrorCode::DeviceBusy.to_string(), "api.err.DeviceBusy");
    }

    #[test]
    fn classification_follows_the_code() {
        let busy = ControllerError::Api {
            code: ErrorCode::DeviceBusy,
            message: "device is busy".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(ErrorKind::of(&busy), ErrorKind::Retryable);
        assert_eq!(
            busy.signal(),
            BackendSignal::Busy {
                retry_after: Some(Duration::from_secs(3))
            }
        );

        let missing = ControllerError::api(ErrorCode::NotFound, "no such device");
        assert_eq!(ErrorKind::of(&missing), ErrorKind::Ignorable);

        let unavailable = ControllerError::api(ErrorCode::ServiceUnavailable, "starting");
        assert_eq!(ErrorKind::of(&unavailable), ErrorKind::Retryable);

        assert_eq!(ErrorKind::of(&ControllerError::Closed), ErrorKind::Fatal);
        assert_eq!(ErrorKind::of(&ControllerError::Cancelled), ErrorKind::Fatal);
        assert_eq!(
            ErrorKind::of(&ControllerError::api(ErrorCode::Other("api.err.Weird".into()), "?")),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn message_text_does_not_affect_classification() {
        let err = ControllerError::api(ErrorCode::InvalidPayload, "device busy, not found");
        assert_eq!(ErrorKind::of(&err), ErrorKind::Fatal);
    }
}
