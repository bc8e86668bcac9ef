//! Error types for the Azure provider.

use std::fmt::Display;

use thiserror::Error;

/// Errors surfaced by provider operations.
///
/// Every variant carries a human readable message; operation code adds
/// context (e.g. `creating Namespace (...)`) via [`ErrorContext`] before the
/// error is converted into a diagnostic.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration for a resource or data source failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The provider configuration is invalid or incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State or payload (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote object already exists and must be imported.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Authentication or authorization against ARM failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// ARM throttled the request.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// ARM or the network is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The operation did not finish within its timeout.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation cannot run in the current provider or remote state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// ARM rejected the request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Internal(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// Prefix the message with `context`, keeping the variant.
    pub fn context(self, context: impl Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            Self::NotFound(msg) => Self::NotFound(wrap(msg)),
            Self::Validation(msg) => Self::Validation(wrap(msg)),
            Self::Internal(msg) => Self::Internal(wrap(msg)),
            Self::Configuration(msg) => Self::Configuration(wrap(msg)),
            Self::UnknownResource(msg) => Self::UnknownResource(wrap(msg)),
            Self::Serialization(err) => Self::InvalidRequest(wrap(err.to_string())),
            Self::AlreadyExists(msg) => Self::AlreadyExists(wrap(msg)),
            Self::PermissionDenied(msg) => Self::PermissionDenied(wrap(msg)),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(wrap(msg)),
            Self::Unavailable(msg) => Self::Unavailable(wrap(msg)),
            Self::DeadlineExceeded(msg) => Self::DeadlineExceeded(wrap(msg)),
            Self::FailedPrecondition(msg) => Self::FailedPrecondition(wrap(msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(wrap(msg)),
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Adds operation context to fallible results.
pub trait ErrorContext<T> {
    /// Wrap the error with a fixed context.
    fn context(self, context: impl Display) -> Result<T, ProviderError>;

    /// Wrap the error with a lazily built context.
    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, ProviderError>;
}

impl<T, E: Into<ProviderError>> ErrorContext<T> for Result<T, E> {
    fn context(self, context: impl Display) -> Result<T, ProviderError> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, ProviderError> {
        self.map_err(|e| e.into().context(f()))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Internal(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("Namespace \"example\"".to_string());
        assert_eq!(format!("{}", err), "Resource not found: Namespace \"example\"");

        let err = ProviderError::UnknownResource("azurerm_servicebus_queue".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: azurerm_servicebus_queue"
        );
    }

    #[test]
    fn test_context_keeps_variant() {
        let err = ProviderError::PermissionDenied("AuthorizationFailed".to_string())
            .context("creating Namespace (Subscription: \"sub\")");
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert_eq!(
            err.message(),
            "creating Namespace (Subscription: \"sub\"): AuthorizationFailed"
        );
    }

    #[test]
    fn test_result_context() {
        let result: Result<(), ProviderError> = Err(ProviderError::NotFound("gone".to_string()));
        let err = result.with_context(|| "retrieving Event Hub").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "retrieving Event Hub: gone");
    }

    #[test]
    fn test_serialization_context_becomes_invalid_request() {
        let decode = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err = ProviderError::from(decode).context("decoding state");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.message().starts_with("decoding state: "));
    }

    #[test]
    fn test_error_to_status() {
        let cases = vec![
            (ProviderError::NotFound("x".into()), tonic::Code::NotFound),
            (ProviderError::Validation("x".into()), tonic::Code::InvalidArgument),
            (ProviderError::Configuration("x".into()), tonic::Code::FailedPrecondition),
            (ProviderError::Internal("x".into()), tonic::Code::Internal),
            (ProviderError::AlreadyExists("x".into()), tonic::Code::AlreadyExists),
            (ProviderError::PermissionDenied("x".into()), tonic::Code::PermissionDenied),
            (ProviderError::ResourceExhausted("x".into()), tonic::Code::ResourceExhausted),
            (ProviderError::Unavailable("x".into()), tonic::Code::Unavailable),
            (ProviderError::DeadlineExceeded("x".into()), tonic::Code::DeadlineExceeded),
            (ProviderError::InvalidRequest("x".into()), tonic::Code::InvalidArgument),
        ];

        for (err, code) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
        }
    }
}
