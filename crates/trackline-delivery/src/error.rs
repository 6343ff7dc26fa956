//! Delivery error taxonomy.
//!
//! Every failed delivery attempt collapses into one of these variants.
//! The queue decides what to do with a task purely from the variant: halt
//! the pass, delete the task, or keep it for a later run.

use thiserror::Error;

/// Outcome classification for a delivery attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Outbound requests are inside a pause window; no call was made.
    #[error("outbound requests are paused")]
    RequestsPaused,

    /// The request never produced an HTTP response (connect failure,
    /// timeout, interrupted body).
    #[error("no response received from server")]
    NoResponseMade,

    /// The server kept returning 5xx until the retry budget ran out.
    #[error("server unavailable, giving up until the pause window ends")]
    ServerDown,

    /// The server rejected our credentials.
    #[error("unauthorized, check the site id and api key")]
    Unauthorized,

    /// Any other non-2xx response.
    #[error("request failed with status {status}: {message}")]
    UnsuccessfulStatusCode { status: u16, message: String },

    /// A stored task names a type this client does not know how to run.
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    /// A stored task payload failed to decode.
    #[error("malformed task payload: {0}")]
    MalformedPayload(String),
}

impl DeliveryError {
    /// Whether this outcome should stop the whole delivery pass.
    ///
    /// These are environment-wide conditions rather than anything
    /// specific to the task that hit them.
    pub fn halts_pass(&self) -> bool {
        matches!(
            self,
            Self::RequestsPaused | Self::NoResponseMade | Self::Unauthorized
        )
    }

    /// Whether this outcome can never succeed on a later run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::UnknownTaskType(_) | Self::MalformedPayload(_) => true,
            Self::UnsuccessfulStatusCode { status, .. } => {
                (400..=499).contains(status) && *status != 401
            }
            _ => false,
        }
    }
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halting_errors() {
        assert!(DeliveryError::RequestsPaused.halts_pass());
        assert!(DeliveryError::NoResponseMade.halts_pass());
        assert!(DeliveryError::Unauthorized.halts_pass());
        assert!(!DeliveryError::ServerDown.halts_pass());
        assert!(!DeliveryError::UnknownTaskType("x".into()).halts_pass());
    }

    #[test]
    fn client_side_rejections_are_fatal() {
        let not_found = DeliveryError::UnsuccessfulStatusCode {
            status: 404,
            message: "unknown customer".to_string(),
        };
        assert!(not_found.is_fatal());
        assert!(DeliveryError::UnknownTaskType("send_fax".into()).is_fatal());
        assert!(DeliveryError::MalformedPayload("bad json".into()).is_fatal());
    }

    #[test]
    fn transient_outcomes_are_not_fatal() {
        let redirect = DeliveryError::UnsuccessfulStatusCode {
            status: 302,
            message: String::new(),
        };
        assert!(!redirect.is_fatal());
        assert!(!DeliveryError::ServerDown.is_fatal());
        assert!(!DeliveryError::RequestsPaused.is_fatal());

        let unauthorized = DeliveryError::UnsuccessfulStatusCode {
            status: 401,
            message: String::new(),
        };
        assert!(!unauthorized.is_fatal());
    }

    #[test]
    fn error_display_includes_status_and_message() {
        let err = DeliveryError::UnsuccessfulStatusCode {
            status: 400,
            message: "invalid attributes".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 400: invalid attributes"
        );
    }
}
