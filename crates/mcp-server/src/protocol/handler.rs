//! MCP request handler

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::ServerCapabilities;
use super::types::*;
use crate::tools::{ToolCatalog, ToolDispatcher, ToolRequest};

/// Server name reported during initialization
pub const SERVER_NAME: &str = "eno-mcp-server";

/// Handler for the MCP requests of one session
pub struct RequestHandler {
    /// Shared tool dispatcher
    dispatcher: Arc<ToolDispatcher>,
    /// Tool definitions
    catalog: ToolCatalog,
    /// Server version
    server_version: String,
    /// Protocol version agreed during initialization
    protocol_version: Option<&'static str>,
    /// Client that initialized this session
    client: Option<ClientInfo>,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            catalog: ToolCatalog::new(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: None,
            client: None,
        }
    }

    /// Whether `initialize` has completed on this session
    pub fn is_initialized(&self) -> bool {
        self.protocol_version.is_some()
    }

    /// Protocol version agreed during initialization
    pub fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version
    }

    /// Client that initialized this session, if it introduced itself
    pub fn client(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }

    /// Handle an incoming message; requests get a reply, the rest do not
    pub async fn handle(&mut self, message: McpMessage) -> Option<McpMessage> {
        match (message.method.as_deref(), message.id.clone()) {
            (Some(method), Some(id)) => {
                debug!("Handling request: {}", method);

                let result = match method {
                    "initialize" => self.handle_initialize(message.params),
                    "ping" => Ok(serde_json::json!({})),
                    "tools/list" => self.handle_tools_list().await,
                    "tools/call" => self.handle_tools_call(message.params).await,
                    _ => Err(McpError::method_not_found()),
                };

                Some(match result {
                    Ok(result) => McpMessage::response(id, result),
                    Err(error) => McpMessage::error_response(Some(id), error),
                })
            }
            (Some(method), None) => {
                match method {
                    "notifications/initialized" | "initialized" => {
                        info!("Client initialized");
                    }
                    "notifications/cancelled" => {
                        debug!("Request cancelled");
                    }
                    _ => {
                        debug!("Unknown notification: {}", method);
                    }
                }
                None
            }
            (None, _) => {
                // Response - we don't expect these in server mode
                debug!("Received unexpected response");
                None
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        let version = negotiate_version(&params.protocol_version);

        match &params.client_info {
            Some(client) => info!(
                "Initializing session with client: {} v{} (protocol {})",
                client.name, client.version, version
            ),
            None => info!("Initializing session (protocol {})", version),
        }

        self.protocol_version = Some(version);
        self.client = params.client_info;

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities::with_tools(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: self.server_version.clone(),
            },
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Handle tools/list request
    async fn handle_tools_list(&self) -> Result<Value, McpError> {
        let accounts = self.dispatcher.store().all().await;
        let result = ToolsListResult {
            tools: self.catalog.generate_tools(&accounts),
        };
        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Handle tools/call request
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let request: ToolRequest = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string()))?
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        debug!("Calling tool: {}", request.tool);

        let result = self.dispatcher.invoke(request).await;
        let call_result = ToolCallResult::json(result.to_value(), !result.success);

        serde_json::to_value(call_result).map_err(|e| McpError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::AccountStore;
    use serde_json::json;

    fn handler() -> RequestHandler {
        let store = Arc::new(AccountStore::demo());
        RequestHandler::new(Arc::new(ToolDispatcher::new(store)))
    }

    fn initialize(version: &str) -> McpMessage {
        McpMessage::request(
            json!(1),
            "initialize",
            Some(json!({
                "protocolVersion": version,
                "clientInfo": {"name": "test", "version": "1.0"},
                "capabilities": {}
            })),
        )
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut handler = handler();
        assert!(!handler.is_initialized());

        let reply = handler.handle(initialize("2024-11-05")).await.unwrap();
        let result = reply.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(handler.is_initialized());
        assert_eq!(handler.protocol_version(), Some("2024-11-05"));
        assert_eq!(handler.client().map(|c| c.name.as_str()), Some("test"));
    }

    #[tokio::test]
    async fn test_initialize_unknown_version_gets_latest() {
        let mut handler = handler();
        let reply = handler.handle(initialize("2020-01-01")).await.unwrap();
        assert_eq!(reply.result.unwrap()["protocolVersion"], MCP_VERSION);
    }

    #[tokio::test]
    async fn test_initialize_without_params() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(json!(1), "initialize", None))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, -32602);
        assert!(!handler.is_initialized());
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let mut handler = handler();
        assert!(handler
            .handle(McpMessage::notification("notifications/initialized", None))
            .await
            .is_none());
        assert!(handler
            .handle(McpMessage::response(json!(1), json!({})))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(json!(9), "resources/list", None))
            .await
            .unwrap();
        assert_eq!(reply.id, Some(json!(9)));
        assert_eq!(reply.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(json!(2), "tools/list", None))
            .await
            .unwrap();
        let tools = reply.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 4);
        assert_eq!(tools[3]["name"], "unlock_card");
    }

    #[tokio::test]
    async fn test_tools_call_wraps_result() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(
                json!(3),
                "tools/call",
                Some(json!({"name": "lock_card", "arguments": {"account": "5660"}})),
            ))
            .await
            .unwrap();

        let result = reply.result.unwrap();
        assert!(result.get("isError").is_none());
        assert_eq!(result["structuredContent"]["locked"], true);

        let text = result["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["status"], "locked");
    }

    #[tokio::test]
    async fn test_tools_call_failure_sets_is_error() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(
                json!(4),
                "tools/call",
                Some(json!({"name": "wire_money"})),
            ))
            .await
            .unwrap();

        let result = reply.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"], "Unknown tool: wire_money");
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let mut handler = handler();
        let reply = handler
            .handle(McpMessage::request(json!(5), "tools/call", None))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, -32602);
    }
}
