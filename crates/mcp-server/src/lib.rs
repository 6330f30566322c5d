//! # eno-mcp-server
//!
//! MCP (Model Context Protocol) gateway for the Eno banking assistant.
//! Serves the account tools over two transports that share one session
//! registry: streamable HTTP on `/mcp` and legacy SSE on `/sse`.

mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use error::GatewayError;
pub use protocol::{McpError, McpMessage, RequestHandler, ServerCapabilities};
pub use server::{AppState, Gateway, GatewayConfig};
pub use session::{SessionId, SessionRegistry, TransportKind};
pub use tools::{ToolCatalog, ToolDispatcher, ToolRequest, ToolResult};
pub use transport::{SessionChannel, Transport};
