//! Legacy SSE transport
//!
//! `GET /sse` opens a long-lived event stream whose first frame is an
//! `endpoint` event naming the side channel. Clients then POST messages to
//! `/message?sessionId=<id>`; replies come back on the event stream.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::decode_message;
use crate::error::GatewayError;
use crate::server::AppState;
use crate::session::{SessionId, TransportKind};

/// Side-channel path for client-to-server messages
pub const MESSAGE_PATH: &str = "/message";

/// Removes the session once its event stream is dropped
struct DisconnectGuard {
    state: Arc<AppState>,
    id: SessionId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.state.close_session(&self.id) {
            info!("[SSE] Closed: {}", self.id);
        }
    }
}

/// Open a legacy event stream and allocate its session
pub async fn connect(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let (id, transport) = state.open_session(TransportKind::LegacySse)?;
    let mut outbound = transport.bind();

    if let Err(e) = state.sessions.register(&id, transport.clone()) {
        transport.close();
        state.sessions.remove(&id)?;
        return Err(e.into());
    }
    info!("[SSE] Connected: {}", id);

    let endpoint = format!("{}?sessionId={}", MESSAGE_PATH, id);
    let guard = DisconnectGuard {
        state: state.clone(),
        id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, axum::Error>(Event::default().event("endpoint").data(endpoint));
        while let Some(message) = outbound.recv().await {
            yield Event::default().event("message").json_data(message);
        }
    };

    let keep_alive = KeepAlive::new().interval(state.config.heartbeat);
    Ok((
        [("x-accel-buffering", "no")],
        Sse::new(stream).keep_alive(keep_alive),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Route a side-channel message to its session; the reply is pushed
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let transport = query
        .session_id
        .map(SessionId::from)
        .and_then(|id| state.sessions.get(&id).ok())
        .ok_or(GatewayError::SessionNotFound)?;

    let message = decode_message(&body)?;

    if let Err(e) = transport.relay(message).await {
        warn!("[SSE] Dropping session {}: {}", transport.session_id(), e);
        state.close_session(transport.session_id());
        return Err(e);
    }

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

#[cfg(test)]
mod tests {
    use crate::server::{Gateway, GatewayConfig};
    use axum::body::{Body, BodyDataStream};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use futures::StreamExt;
    use http_body_util::BodyExt;
    use ledger_core::AccountStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn setup() -> (Gateway, Router) {
        setup_with(GatewayConfig::default())
    }

    fn setup_with(config: GatewayConfig) -> (Gateway, Router) {
        let gateway = Gateway::new(Arc::new(AccountStore::demo()), config);
        let router = gateway.router();
        (gateway, router)
    }

    async fn next_frame(stream: &mut BodyDataStream) -> String {
        let frame = stream.next().await.unwrap().unwrap();
        String::from_utf8(frame.to_vec()).unwrap()
    }

    /// Connect and return the open stream plus the side-channel URI
    async fn connect(app: &Router) -> (BodyDataStream, String) {
        let resp = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");

        let mut stream = resp.into_body().into_data_stream();
        let frame = next_frame(&mut stream).await;
        assert!(frame.starts_with("event: endpoint\n"));

        let uri = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
            .to_string();
        (stream, uri)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn pushed_message(frame: &str) -> Value {
        assert!(frame.starts_with("event: message\n"));
        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        serde_json::from_str(data).unwrap()
    }

    #[tokio::test]
    async fn test_connect_registers_session() {
        let (gateway, app) = setup();
        let (_stream, uri) = connect(&app).await;

        assert!(uri.starts_with("/message?sessionId="));
        let id = uri.trim_start_matches("/message?sessionId=");
        assert!(gateway.state().sessions.contains(&id.into()));
    }

    #[tokio::test]
    async fn test_idle_stream_emits_heartbeats() {
        let (gateway, app) = setup_with(GatewayConfig {
            heartbeat: std::time::Duration::from_millis(20),
            ..GatewayConfig::default()
        });
        let (mut stream, _uri) = connect(&app).await;

        for _ in 0..2 {
            let frame = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                next_frame(&mut stream),
            )
            .await
            .unwrap();
            assert!(frame.starts_with(':'), "unexpected frame: {frame:?}");
        }
        assert_eq!(gateway.state().sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_replies_arrive_on_stream() {
        let (_gateway, app) = setup();
        let (mut stream, uri) = connect(&app).await;

        let resp = app
            .clone()
            .oneshot(post(
                &uri,
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "initialize",
                    "params": {"protocolVersion": "2024-11-05", "capabilities": {}}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Accepted");

        let reply = pushed_message(&next_frame(&mut stream).await);
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");

        let resp = app
            .oneshot(post(
                &uri,
                json!({
                    "jsonrpc": "2.0",
                    "id": 2,
                    "method": "tools/call",
                    "params": {"name": "get_transactions", "arguments": {"account": "venture", "limit": 2}}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let reply = pushed_message(&next_frame(&mut stream).await);
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["result"]["structuredContent"]["last4"], "5961");
        assert_eq!(reply["result"]["structuredContent"]["transaction_count"], 2);
    }

    #[tokio::test]
    async fn test_notification_pushes_nothing() {
        let (_gateway, app) = setup();
        let (_stream, uri) = connect(&app).await;

        let resp = app
            .oneshot(post(
                &uri,
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_gateway, app) = setup();

        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let resp = app
            .clone()
            .oneshot(post("/message?sessionId=nope", ping.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Session not found");

        let resp = app.oneshot(post("/message", ping)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_to_stream_endpoint_not_allowed() {
        let (gateway, app) = setup();

        let resp = app
            .oneshot(post("/sse", json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(gateway.state().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_removes_session() {
        let (gateway, app) = setup();
        let (stream, uri) = connect(&app).await;
        assert_eq!(gateway.state().sessions.len(), 1);

        drop(stream);
        assert!(gateway.state().sessions.is_empty());

        let resp = app
            .oneshot(post(&uri, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disconnect_during_relay_closes_only_that_session() {
        let (gateway, app) = setup();
        let (_kept, kept_uri) = connect(&app).await;
        let (_dropped, dropped_uri) = connect(&app).await;

        // Simulate a half-closed connection: the push stream goes away
        // while the registry entry survives.
        let dropped_id = dropped_uri.trim_start_matches("/message?sessionId=");
        let transport = gateway
            .state()
            .sessions
            .get(&dropped_id.into())
            .unwrap();
        drop(transport.bind());

        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let resp = app.clone().oneshot(post(&dropped_uri, ping.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!gateway.state().sessions.contains(&dropped_id.into()));

        let resp = app.oneshot(post(&kept_uri, ping)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(gateway.state().sessions.len(), 1);
    }
}
