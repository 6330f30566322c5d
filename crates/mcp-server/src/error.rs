//! Transport-level errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::protocol::{McpError, McpMessage};
use crate::session::SessionError;

/// Errors surfaced to HTTP callers rather than inside a tool reply
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed handshake, missing or unknown session header
    #[error("{0}")]
    Protocol(String),

    /// Body is not valid JSON-RPC
    #[error("Parse error: {0}")]
    Parse(String),

    /// Handshake was well-formed but rejected by the handler
    #[error("Initialization rejected")]
    Rejected(McpMessage),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Session not found")]
    SessionNotFound,

    /// I/O failure pushing to a client; terminates that session only
    #[error("Transport fault: {0}")]
    TransportFault(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Protocol(_) | Self::Parse(_) | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::TransportFault(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Parse(detail) => {
                let body = McpMessage::error_response(
                    None,
                    McpError::parse_error().with_data(json!(detail)),
                );
                (status, Json(body)).into_response()
            }
            Self::Rejected(reply) => (status, Json(reply)).into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::Protocol("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(GatewayError::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::from(SessionError::Poisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
