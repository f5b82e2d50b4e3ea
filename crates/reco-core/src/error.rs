//! Error types for Reco Core
//!
//! Covers every failure the orchestration core can surface:
//! - Remote (transport/API) errors, carried verbatim with their status code
//! - Apply-time failures: test mismatches, unsupported operations, malformed values
//! - Request ledger rejections (duplicate or unknown request)
//!
//! Unsatisfied project requirements are not errors; they are reported as data
//! through [`crate::ProjectRequirements`].

/// HTTP status used for remote errors that carry no code of their own
const DEFAULT_REMOTE_STATUS: u16 = 500;

/// Main error type for the orchestration core
///
/// `Clone` so that a terminal result stored in a handle can be handed to a
/// poller by value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoError {
    /// Transport or remote API failure
    #[error("remote call failed ({code}): {message}")]
    Remote {
        /// Status code reported by the remote side
        code: u16,
        /// Message reported by the remote side
        message: String,
    },

    /// A `test` operation did not match the live resource
    #[error("{field} is not as expected")]
    TestFailed {
        /// Human-readable name of the tested field
        field: String,
    },

    /// The (action, path, resource type) combination is not supported
    #[error("the operation is not supported: {action} {path} on {resource_type}")]
    UnsupportedOperation {
        /// Operation action as it appeared on the wire
        action: String,
        /// Operation path
        path: String,
        /// Operation resource type
        resource_type: String,
    },

    /// The operation value has the wrong shape for its action
    #[error("wrong value type for operation {0}")]
    InvalidValue(String),

    /// A resource path does not contain a required segment
    #[error("resource {resource} does not contain the parameter {segment}")]
    MissingSegment {
        /// The resource path that was inspected
        resource: String,
        /// The missing segment name (e.g. `zones`)
        segment: String,
    },

    /// A value matcher pattern failed to compile
    #[error("invalid value matcher pattern: {0}")]
    InvalidPattern(String),

    /// A request with the same key is already in flight
    #[error("the request was already added")]
    DuplicateRequest,

    /// No request exists for the given key
    #[error("no request {request_id} for {requester}")]
    RequestNotFound {
        /// Requester identity
        requester: String,
        /// Request identifier
        request_id: String,
    },
}

impl RecoError {
    /// Create a remote error with an explicit status code
    #[inline]
    pub fn remote(code: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Create a remote error without a known status code
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::remote(DEFAULT_REMOTE_STATUS, message)
    }

    /// HTTP status the edge layer should answer with
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Remote { code, .. } => *code,
            Self::TestFailed { .. }
            | Self::UnsupportedOperation { .. }
            | Self::InvalidValue(_)
            | Self::MissingSegment { .. }
            | Self::InvalidPattern(_) => 400,
            Self::DuplicateRequest => 405,
            Self::RequestNotFound { .. } => 404,
        }
    }

    /// Whether the error aborts only a single apply rather than a batch
    #[inline]
    #[must_use]
    pub fn is_apply_failure(&self) -> bool {
        matches!(
            self,
            Self::TestFailed { .. }
                | Self::UnsupportedOperation { .. }
                | Self::InvalidValue(_)
                | Self::MissingSegment { .. }
                | Self::InvalidPattern(_)
        )
    }
}

/// Result alias for the orchestration core
pub type RecoResult<T> = Result<T, RecoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_their_code() {
        let err = RecoError::remote(403, "permission denied");
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "remote call failed (403): permission denied");
    }

    #[test]
    fn ledger_errors_map_to_client_codes() {
        assert_eq!(RecoError::DuplicateRequest.status_code(), 405);
        let missing = RecoError::RequestNotFound {
            requester: "a@example.com".into(),
            request_id: "r1".into(),
        };
        assert_eq!(missing.status_code(), 404);
    }

    #[test]
    fn apply_failures_are_classified() {
        assert!(RecoError::TestFailed { field: "status".into() }.is_apply_failure());
        assert!(!RecoError::transport("boom").is_apply_failure());
        assert_eq!(RecoError::transport("boom").status_code(), 500);
    }
}
