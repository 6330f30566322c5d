//! Streamable HTTP transport for MCP
//!
//! One endpoint, four request shapes, told apart by method and by the
//! `Mcp-Session-Id` header:
//!
//! | method | header        | effect                                     |
//! |--------|---------------|--------------------------------------------|
//! | DELETE | any           | close the session if known; always `200`    |
//! | GET    | known         | open the server-to-client event stream     |
//! | POST   | known         | handle the message, reply in the response  |
//! | POST   | absent/unknown| must be `initialize`; opens a new session   |

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use super::decode_message;
use crate::error::GatewayError;
use crate::server::{AppState, SessionHandle};
use crate::session::{SessionId, TransportKind};

/// Session header name (HTTP header names are case-insensitive)
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Entry point for every method on the streamable endpoint
pub async fn handle(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(SessionId::from);

    debug!(
        "[MCP] {} session={}",
        method,
        session_id.as_ref().map(SessionId::as_str).unwrap_or("new")
    );

    match method {
        Method::DELETE => Ok(terminate(&state, session_id)),
        Method::GET => open_stream(&state, session_id),
        Method::POST => {
            let known = session_id.and_then(|id| state.sessions.get(&id).ok());
            match known {
                Some(transport) => resume(transport, &body).await,
                None => bootstrap(&state, &body).await,
            }
        }
        _ => Err(GatewayError::MethodNotAllowed),
    }
}

/// DELETE: idempotent session termination
fn terminate(state: &AppState, session_id: Option<SessionId>) -> Response {
    if let Some(id) = session_id {
        if state.close_session(&id) {
            info!("[MCP] Session deleted: {}", id);
        }
    }
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

/// GET: bind this connection as the session's push stream
///
/// Disconnecting drops the stream but leaves the session usable for POSTs.
fn open_stream(state: &AppState, session_id: Option<SessionId>) -> Result<Response, GatewayError> {
    let transport = session_id
        .and_then(|id| state.sessions.get(&id).ok())
        .ok_or_else(|| GatewayError::Protocol("Invalid or missing Mcp-Session-Id header".into()))?;

    debug!("[MCP] Push stream opened: {}", transport.session_id());

    let stream = ReceiverStream::new(transport.bind())
        .map(|message| Event::default().event("message").json_data(message));

    Ok(Sse::new(stream).into_response())
}

/// POST on a live session: the reply travels back on this response
async fn resume(transport: SessionHandle, body: &[u8]) -> Result<Response, GatewayError> {
    let message = decode_message(body)?;
    let id = transport.session_id().clone();

    let response = match transport.deliver(message).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    Ok(with_session_header(response, &id))
}

/// POST without a live session: only `initialize` may open one
async fn bootstrap(state: &AppState, body: &[u8]) -> Result<Response, GatewayError> {
    let message = decode_message(body)?;
    if !message.is_initialize_request() {
        return Err(GatewayError::Protocol(
            "New session must start with an initialize request".into(),
        ));
    }

    let (id, transport) = state.open_session(TransportKind::StreamableHttp)?;

    let reply = match transport.deliver(message).await {
        Some(reply) if reply.error.is_none() => reply,
        rejected => {
            state.sessions.remove(&id)?;
            transport.close();
            return Err(match rejected {
                Some(reply) => GatewayError::Rejected(reply),
                None => GatewayError::Protocol("initialize produced no reply".into()),
            });
        }
    };

    state.sessions.register(&id, transport)?;
    info!("[MCP] Session created: {}", id);

    Ok(with_session_header(Json(reply).into_response(), &id))
}

fn with_session_header(mut response: Response, id: &SessionId) -> Response {
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}
