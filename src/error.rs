//! Client error types.

use thiserror::Error;

use crate::models::envelope::{ApiError, Envelope};

pub const SERVER_UNREACHABLE_MESSAGE: &str = "O servidor não está respondendo.";
pub const REQUEST_CANCELLED_MESSAGE: &str = "A requisição foi cancelada.";
pub const MALFORMED_RESPONSE_MESSAGE: &str = "Resposta inválida do servidor.";

/// Status code synthesized for transport failures and cancellation.
pub const TRANSPORT_ERROR_CODE: u16 = 500;
/// Status code synthesized when a response body cannot be parsed.
pub const MALFORMED_RESPONSE_CODE: u16 = 502;

/// Everything that can go wrong below the envelope layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced an HTTP response (DNS, refused, reset...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller aborted the request through its cancellation token.
    #[error("Request cancelled")]
    Cancelled,

    /// A response arrived but its body was not valid JSON.
    #[error("Malformed response (status {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl ClientError {
    /// Folds a request-path error into the failure envelope callers branch on.
    pub fn to_envelope(&self) -> Envelope {
        let error = match self {
            ClientError::Transport(native) => ApiError {
                code: TRANSPORT_ERROR_CODE,
                message: SERVER_UNREACHABLE_MESSAGE.to_string(),
                description: Some(native.clone()),
            },
            ClientError::Cancelled => ApiError {
                code: TRANSPORT_ERROR_CODE,
                message: REQUEST_CANCELLED_MESSAGE.to_string(),
                description: Some("request aborted by caller".to_string()),
            },
            ClientError::MalformedResponse { message, .. } => ApiError {
                code: MALFORMED_RESPONSE_CODE,
                message: MALFORMED_RESPONSE_MESSAGE.to_string(),
                description: Some(message.clone()),
            },
            other => ApiError {
                code: TRANSPORT_ERROR_CODE,
                message: SERVER_UNREACHABLE_MESSAGE.to_string(),
                description: Some(other.to_string()),
            },
        };
        Envelope::failure(error)
    }
}
