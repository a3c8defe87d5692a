//! Error types for the Mule B2B provider.

use thiserror::Error;

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote entity or lookup key was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A lookup matched more than one remote entity.
    #[error("Ambiguous lookup: {0}")]
    Ambiguous(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Server state could not be correlated with configuration.
    #[error("Reconciliation failed: {0}")]
    Reconcile(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to the remote API could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or message returned by the API.
        message: String,
    },

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The provider has not been configured yet.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not supported for the resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Ambiguous(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Reconcile(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg) => msg.clone(),
            Self::Api { message, .. } => message.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
        }
    }

    /// Map an HTTP status and response body returned by the API to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether this error means the remote entity no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Ambiguous(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Reconcile(msg) => tonic::Status::aborted(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Http(err) => {
                tonic::Status::unavailable(format!("HTTP error: {}", err))
            },
            ProviderError::Api { status, message } => {
                tonic::Status::unknown(format!("API error ({}): {}", status, message))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("partner-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: partner-123");

        let err = ProviderError::Ambiguous("multiple results found with name (AS2)".to_string());
        assert_eq!(
            format!("{}", err),
            "Ambiguous lookup: multiple results found with name (AS2)"
        );

        let err = ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(format!("{}", err), "API error (500): boom");
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ProviderError::from_status(404, "gone"),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "no"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "no"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_status(409, "dup"),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from_status(502, "bad gateway"),
            ProviderError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Configuration("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::Reconcile("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Aborted);

        let status: tonic::Status = ProviderError::from_status(500, "test").into();
        assert_eq!(status.code(), tonic::Code::Unknown);
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::from_status(418, "teapot");
        assert_eq!(err.message(), "teapot");
        assert!(!err.is_not_found());
        assert!(ProviderError::NotFound("x".into()).is_not_found());
    }
}
