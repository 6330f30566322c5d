//! Gateway: both transports over one session registry and one dispatcher

use axum::{
    extract::State,
    http::{header, HeaderName, Method},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::protocol::{RequestHandler, SERVER_NAME};
use crate::session::{SessionId, SessionRegistry, TransportKind};
use crate::tools::ToolDispatcher;
use crate::transport::{sse, streamable, SessionChannel, Transport};
use ledger_core::AccountStore;

/// Gateway configuration, read once at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Interface to bind
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Keep-alive interval on legacy event streams
    pub heartbeat: Duration,
    /// Idle window after which streamable-HTTP sessions are closed
    pub session_idle: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            heartbeat: Duration::from_secs(15),
            session_idle: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Handle stored in the registry for each session
pub type SessionHandle = Arc<dyn Transport>;

/// Shared state for HTTP handlers
pub struct AppState {
    pub sessions: SessionRegistry<SessionHandle>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub config: GatewayConfig,
}

impl AppState {
    pub fn new(dispatcher: Arc<ToolDispatcher>, config: GatewayConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            dispatcher,
            config,
        }
    }

    /// Allocate a session id and build its transport, without registering it
    pub fn open_session(
        &self,
        kind: TransportKind,
    ) -> Result<(SessionId, SessionHandle), GatewayError> {
        let id = self.sessions.create(kind)?;
        let handler = RequestHandler::new(self.dispatcher.clone());
        let handle: SessionHandle = Arc::new(SessionChannel::new(id.clone(), kind, handler));
        Ok((id, handle))
    }

    /// Remove a session from the registry and close its transport
    ///
    /// Returns whether the session was live.
    pub fn close_session(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Ok(Some(handle)) => {
                handle.close();
                info!("Session closed: {} ({})", id, handle.kind());
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to close session {}: {}", id, e);
                false
            }
        }
    }

    /// Close streamable-HTTP sessions idle longer than the configured window
    ///
    /// A session whose push stream is still open is not idle; the lookup
    /// refreshes its activity so the window restarts once the stream ends.
    pub fn sweep_idle_sessions(&self) -> usize {
        let Some(idle) = self.config.session_idle else {
            return 0;
        };
        let Ok(idle) = chrono::Duration::from_std(idle) else {
            return 0;
        };

        let cutoff = chrono::Utc::now() - idle;
        let candidates = match self
            .sessions
            .idle_since(TransportKind::StreamableHttp, cutoff)
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Idle sweep skipped: {}", e);
                return 0;
            }
        };

        let mut expired = 0;
        for id in &candidates {
            if let Ok(handle) = self.sessions.get(id) {
                if handle.has_live_stream() {
                    debug!("Session {} has an open push stream, kept", id);
                    continue;
                }
            }
            info!("Session expired after idling: {}", id);
            self.close_session(id);
            expired += 1;
        }
        expired
    }

    /// Close every live session
    pub fn close_all(&self) {
        for id in self.sessions.ids() {
            self.close_session(&id);
        }
    }
}

/// The process entry point binding both transports
pub struct Gateway {
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a gateway over an account store
    pub fn new(store: Arc<AccountStore>, config: GatewayConfig) -> Self {
        let dispatcher = Arc::new(ToolDispatcher::new(store));
        Self {
            state: Arc::new(AppState::new(dispatcher, config)),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// HTTP routes for both transports plus health
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind the listener and serve until Ctrl-C
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config = &self.state.config;
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("Eno MCP server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
        info!("  GET  /health  - status");
        info!("  POST /mcp     - streamable HTTP");
        info!("  GET  /sse     - legacy SSE");

        let sweeper = config.session_idle.map(|idle| {
            let state = self.state.clone();
            let period = (idle / 4).max(Duration::from_secs(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    state.sweep_idle_sessions();
                }
            })
        });

        let state = self.state.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Shutting down, closing {} sessions", state.sessions.len());
                // Ends open event streams so in-flight connections can drain
                state.close_all();
            })
            .await?;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        Ok(())
    }
}

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    let session_header = HeaderName::from_static(streamable::SESSION_HEADER);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, session_header.clone()])
        .expose_headers([session_header]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/mcp", any(streamable::handle))
        .route("/sse", get(sse::connect))
        .route(sse::MESSAGE_PATH, post(sse::post_message))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "server": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "transports": ["streamable-http (/mcp)", "sse-legacy (/sse)"],
        "sessions": state.sessions.len(),
    }))
}
