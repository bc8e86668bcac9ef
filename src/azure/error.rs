//! Errors from talking to Azure Resource Manager.

use serde::Deserialize;
use thiserror::Error;

use crate::error::ProviderError;

/// A failed ARM call.
#[derive(Debug, Error)]
pub enum ArmError {
    /// ARM answered with a non-success status.
    #[error("unexpected status {status} with error: {code}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// ARM error code, e.g. `ResourceNotFound`.
        code: String,
        /// ARM error message.
        message: String,
    },

    /// The request could not be sent or the response not received.
    #[error("sending request: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Obtaining an access token failed.
    #[error("obtaining access token: {0}")]
    Auth(String),

    /// A long running operation finished unsuccessfully.
    #[error("long running operation {status} with error: {code}: {message}")]
    OperationFailed {
        /// Terminal status (`Failed`, `Canceled`).
        status: String,
        /// ARM error code.
        code: String,
        /// ARM error message.
        message: String,
    },

    /// ARM accepted an asynchronous operation but gave no way to track it.
    #[error("long running operation returned no polling URL")]
    MissingPollingUrl,

    /// A request URL could not be built.
    #[error("building request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ArmError {
    /// The HTTP status, when ARM answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether ARM reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Build an [`ArmError::Api`] from a status and raw error body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (
                reason_phrase(status).to_string(),
                body.chars().take(512).collect(),
            ),
        };
        Self::Api {
            status,
            code,
            message,
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// The inner error object of an ARM error response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<ArmError> for ProviderError {
    fn from(err: ArmError) -> Self {
        let message = err.to_string();
        match &err {
            ArmError::Api { status, .. } => match status {
                404 => ProviderError::NotFound(message),
                401 | 403 => ProviderError::PermissionDenied(message),
                409 => ProviderError::AlreadyExists(message),
                429 => ProviderError::ResourceExhausted(message),
                500..=599 => ProviderError::Unavailable(message),
                _ => ProviderError::InvalidRequest(message),
            },
            ArmError::Http(_) => ProviderError::Unavailable(message),
            ArmError::Auth(_) => ProviderError::PermissionDenied(message),
            ArmError::Decode(_)
            | ArmError::OperationFailed { .. }
            | ArmError::MissingPollingUrl
            | ArmError::InvalidUrl(_) => ProviderError::Internal(message),
        }
    }
}
