//! Transport implementations for MCP server
//!
//! Both wire mechanisms share one [`Transport`] abstraction, so the session
//! registry and the tool dispatcher never see which adapter a session came
//! in on. Each adapter adds only what sets it apart:
//!
//! - [`streamable`]: one multiplexed `/mcp` endpoint, `Mcp-Session-Id`
//!   header, sessions opened only by an `initialize` request
//! - [`sse`]: long-lived `/sse` event stream with heartbeats, plus
//!   side-channel POSTs to `/message?sessionId=...`

mod channel;
pub mod sse;
pub mod streamable;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::protocol::McpMessage;
use crate::session::{SessionId, TransportKind};

pub use channel::SessionChannel;

/// Server-to-client messages buffered per session before pushes fail
pub const OUTBOUND_BUFFER: usize = 64;

/// Receiving end of a session's push stream
pub type OutboundReceiver = mpsc::Receiver<McpMessage>;

/// Capabilities every session transport provides
#[async_trait]
pub trait Transport: Send + Sync {
    /// Session this transport serves
    fn session_id(&self) -> &SessionId;

    /// Wire mechanism the session was opened on
    fn kind(&self) -> TransportKind;

    /// Bind a new server-to-client stream, replacing any previous one
    fn bind(&self) -> OutboundReceiver;

    /// Handle an inbound message and return the reply, if any
    async fn deliver(&self, message: McpMessage) -> Option<McpMessage>;

    /// Handle an inbound message and push the reply onto the bound stream
    async fn relay(&self, message: McpMessage) -> Result<(), GatewayError>;

    /// Push a server-to-client message onto the bound stream
    fn push(&self, message: McpMessage) -> Result<(), GatewayError>;

    /// Close the transport; the bound stream ends and pushes fail
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Whether a bound server-to-client stream is still being read
    fn has_live_stream(&self) -> bool;
}

/// Decode a request body as a JSON-RPC message
pub(crate) fn decode_message(body: &[u8]) -> Result<McpMessage, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Parse(e.to_string()))
}
