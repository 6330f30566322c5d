//! Per-session transport channel shared by both adapters

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{OutboundReceiver, Transport, OUTBOUND_BUFFER};
use crate::error::GatewayError;
use crate::protocol::{McpMessage, RequestHandler};
use crate::session::{SessionId, TransportKind};

/// A session's request handler plus its (optional) server-to-client stream
///
/// The handler sits behind an async mutex, so messages on one session are
/// handled one at a time, in arrival order.
pub struct SessionChannel {
    id: SessionId,
    kind: TransportKind,
    handler: tokio::sync::Mutex<RequestHandler>,
    outbound: Mutex<Option<mpsc::Sender<McpMessage>>>,
    closed: AtomicBool,
}

impl SessionChannel {
    pub fn new(id: SessionId, kind: TransportKind, handler: RequestHandler) -> Self {
        Self {
            id,
            kind,
            handler: tokio::sync::Mutex::new(handler),
            outbound: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<McpMessage>, GatewayError> {
        let outbound = self
            .outbound
            .lock()
            .map_err(|_| GatewayError::TransportFault("outbound lock poisoned".into()))?;
        outbound
            .clone()
            .ok_or_else(|| GatewayError::TransportFault(format!("no stream bound to session {}", self.id)))
    }
}

#[async_trait]
impl Transport for SessionChannel {
    fn session_id(&self) -> &SessionId {
        &self.id
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn bind(&self) -> OutboundReceiver {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        match self.outbound.lock() {
            Ok(mut outbound) if !self.is_closed() => {
                if outbound.replace(tx).is_some() {
                    debug!("Session {} replaced its push stream", self.id);
                }
            }
            // Closed (or poisoned): tx drops here and the stream ends at once
            _ => warn!("Refusing to bind a stream to closed session {}", self.id),
        }
        rx
    }

    async fn deliver(&self, message: McpMessage) -> Option<McpMessage> {
        let mut handler = self.handler.lock().await;
        handler.handle(message).await
    }

    async fn relay(&self, message: McpMessage) -> Result<(), GatewayError> {
        let mut handler = self.handler.lock().await;
        match handler.handle(message).await {
            Some(reply) => self.push(reply),
            None => Ok(()),
        }
    }

    fn push(&self, message: McpMessage) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::TransportFault(format!(
                "session {} is closed",
                self.id
            )));
        }

        self.sender()?.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                GatewayError::TransportFault(format!("push buffer full for session {}", self.id))
            }
            mpsc::error::TrySendError::Closed(_) => {
                GatewayError::TransportFault(format!("stream for session {} disconnected", self.id))
            }
        })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
        debug!("Session {} transport closed", self.id);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn has_live_stream(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.outbound
            .lock()
            .map(|outbound| outbound.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDispatcher;
    use ledger_core::AccountStore;
    use serde_json::json;
    use std::sync::Arc;

    fn channel() -> SessionChannel {
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(AccountStore::demo())));
        SessionChannel::new(
            SessionId::generate(),
            TransportKind::LegacySse,
            RequestHandler::new(dispatcher),
        )
    }

    fn ping(id: i64) -> McpMessage {
        McpMessage::request(json!(id), "ping", None)
    }

    #[tokio::test]
    async fn test_push_without_stream_is_a_fault() {
        let channel = channel();
        assert!(matches!(
            channel.push(ping(1)),
            Err(GatewayError::TransportFault(_))
        ));
    }

    #[tokio::test]
    async fn test_relay_pushes_replies_in_order() {
        let channel = channel();
        let mut rx = channel.bind();

        for id in 1..=3 {
            channel.relay(ping(id)).await.unwrap();
        }
        channel
            .relay(McpMessage::notification("notifications/initialized", None))
            .await
            .unwrap();

        for id in 1..=3 {
            let reply = rx.recv().await.unwrap();
            assert_eq!(reply.id, Some(json!(id)));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rebind_replaces_stream() {
        let channel = channel();
        let mut first = channel.bind();
        let mut second = channel.bind();

        channel.push(ping(1)).unwrap();
        assert!(first.recv().await.is_none());
        assert_eq!(second.recv().await.unwrap().id, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_dropped_stream_is_a_fault() {
        let channel = channel();
        drop(channel.bind());
        assert!(matches!(
            channel.push(ping(1)),
            Err(GatewayError::TransportFault(_))
        ));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let channel = channel();
        let mut rx = channel.bind();

        channel.close();
        channel.close();

        assert!(channel.is_closed());
        assert!(rx.recv().await.is_none());
        assert!(channel.push(ping(1)).is_err());
        assert!(channel.bind().recv().await.is_none());
    }

    #[tokio::test]
    async fn test_live_stream_tracks_receiver() {
        let channel = channel();
        assert!(!channel.has_live_stream());

        let rx = channel.bind();
        assert!(channel.has_live_stream());

        drop(rx);
        assert!(!channel.has_live_stream());

        let _rx = channel.bind();
        channel.close();
        assert!(!channel.has_live_stream());
    }

    #[tokio::test]
    async fn test_deliver_returns_reply() {
        let channel = channel();
        let reply = channel.deliver(ping(7)).await.unwrap();
        assert_eq!(reply.id, Some(json!(7)));
        assert_eq!(channel.kind(), TransportKind::LegacySse);
    }
}
