//! Error types for the Nomad provider.

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by provider operations.
///
/// Every variant is reported to the host as an error diagnostic; the
/// variant only decides the gRPC status code and whether a read treats the
/// failure as "the object is gone".
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object does not exist in Nomad.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The configuration is invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider block is invalid or could not be applied.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resource operation was attempted before `Configure`.
    #[error("Provider is not configured")]
    NotConfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The requested data source type is unknown.
    #[error("Unknown data source type: {0}")]
    UnknownDataSource(String),

    /// A state or configuration payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A Nomad API call failed.
    #[error("{context}: {source}")]
    Api {
        /// What the provider was doing.
        context: String,
        /// The underlying client error.
        #[source]
        source: ApiError,
    },

    /// Nomad is temporarily unable to complete the operation.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A polling loop ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation is not supported by this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Wrap an API error with what the provider was doing.
    ///
    /// 404 responses become [`ProviderError::NotFound`] so callers can
    /// distinguish absence from failure without inspecting messages.
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        let context = context.into();
        match source {
            ApiError::NotFound(_) => Self::NotFound(context),
            source => Self::Api { context, source },
        }
    }

    /// Whether this error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Attach context to API results, mirroring `fmt.Errorf("...: %w", err)`.
pub trait ApiResultExt<T> {
    /// Convert the error with [`ProviderError::api`].
    fn context(self, context: impl Into<String>) -> Result<T, ProviderError>;

    /// Like [`ApiResultExt::context`], but the message is built lazily.
    fn with_context<F, S>(self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    fn context(self, context: impl Into<String>) -> Result<T, ProviderError> {
        self.map_err(|e| ProviderError::api(context, e))
    }

    fn with_context<F, S>(self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| ProviderError::api(f(), e))
    }
}

/// Treat [`ProviderError::NotFound`] as an absent value.
pub trait OptionalExt<T> {
    /// `Ok(None)` for not-found, the error otherwise.
    fn optional(self) -> Result<Option<T>, ProviderError>;
}

impl<T> OptionalExt<T> for Result<T, ProviderError> {
    fn optional(self) -> Result<Option<T>, ProviderError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::NotFound(_) | ProviderError::UnknownResource(_) => {
                tonic::Status::not_found(message)
            },
            ProviderError::UnknownDataSource(_) => tonic::Status::not_found(message),
            ProviderError::Validation(_) | ProviderError::Serialization(_) => {
                tonic::Status::invalid_argument(message)
            },
            ProviderError::Configuration(_) | ProviderError::NotConfigured => {
                tonic::Status::failed_precondition(message)
            },
            ProviderError::Transport(_) | ProviderError::Unavailable(_) => {
                tonic::Status::unavailable(message)
            },
            ProviderError::Api { ref source, .. } => match source {
                ApiError::Status { status: 403, .. } => tonic::Status::permission_denied(message),
                ApiError::Status { status: 400, .. } => tonic::Status::invalid_argument(message),
                _ => tonic::Status::internal(message),
            },
            ProviderError::DeadlineExceeded(_) => tonic::Status::deadline_exceeded(message),
            ProviderError::Unimplemented(_) => tonic::Status::unimplemented(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional() {
        let found: Result<u8, ProviderError> = Ok(1);
        assert_eq!(found.optional().unwrap(), Some(1));
        let missing: Result<u8, ProviderError> = Err(ProviderError::NotFound("x".into()));
        assert_eq!(missing.optional().unwrap(), None);
        let failed: Result<u8, ProviderError> = Err(ProviderError::Validation("x".into()));
        assert!(failed.optional().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("acl policy \"ops\"".to_string());
        assert_eq!(format!("{}", err), "Resource not found: acl policy \"ops\"");

        let err = ProviderError::Validation("bind_name must be set".to_string());
        assert_eq!(format!("{}", err), "Validation error: bind_name must be set");

        let err = ProviderError::UnknownResource("nomad_widget".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: nomad_widget");
    }

    #[test]
    fn test_api_not_found_is_typed() {
        let err = ProviderError::api(
            "error reading namespace \"ops\"",
            ApiError::NotFound("/v1/namespace/ops".to_string()),
        );
        assert!(err.is_not_found());

        let err = ProviderError::api(
            "error reading namespace \"ops\"",
            ApiError::Status {
                status: 500,
                message: "404 bottles of beer".to_string(),
            },
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("error reading namespace"));
    }

    #[test]
    fn test_result_context() {
        let result: Result<(), ApiError> = Err(ApiError::Status {
            status: 400,
            message: "namespace has non-terminal jobs".to_string(),
        });
        let err = result.context("error deleting namespace").unwrap_err();
        assert_eq!(
            err.to_string(),
            "error deleting namespace: Unexpected response code: 400 (namespace has non-terminal jobs)"
        );
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("x".into()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("x".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::NotConfigured.into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::api(
            "error reading acl token",
            ApiError::Status {
                status: 403,
                message: "Permission denied".into(),
            },
        )
        .into();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let status: tonic::Status = ProviderError::DeadlineExceeded("x".into()).into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }
}
