//! Transport-independent JSON-RPC message handling
//!
//! [`McpServer::handle_message`] takes one raw JSON-RPC message plus the
//! authentication strategy resolved by the transport, and returns the
//! serialized response. Notifications produce no response.

use std::sync::Arc;

use serde_json::Value;

use crate::auth::AuthStrategy;
use crate::gitlab::GitLabClient;
use crate::oauth::session::SessionManager;
use crate::server::protocol::{
    negotiate_protocol_version, CallToolParams, CallToolResponse, Implementation,
    InitializeParams, InitializeResponse, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResponse, ServerCapabilities, ToolsCapability, JSONRPC_VERSION, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::tools::{ServerMetadata, ToolContext, ToolRegistry};

const INSTRUCTIONS: &str = "Tools for the GitLab REST API. Projects accept a numeric id or a \
full path such as 'group/project'. List tools accept per_page, page and max_pages.";

/// MCP request handler shared by all transports.
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    metadata: Arc<ServerMetadata>,
    gitlab: GitLabClient,
    sessions: Option<Arc<SessionManager>>,
}

impl McpServer {
    /// Creates a handler.
    ///
    /// # Arguments
    ///
    /// * `registry` - Tools offered to clients
    /// * `metadata` - Facts reported by `initialize` and the server tools
    /// * `gitlab` - Base client; each request gets a copy bound to its auth
    /// * `sessions` - Session manager when user OAuth is enabled
    pub fn new(
        registry: Arc<ToolRegistry>,
        metadata: Arc<ServerMetadata>,
        gitlab: GitLabClient,
        sessions: Option<Arc<SessionManager>>,
    ) -> Self {
        Self {
            registry,
            metadata,
            gitlab,
            sessions,
        }
    }

    /// Registered tools.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Server facts.
    pub fn metadata(&self) -> &Arc<ServerMetadata> {
        &self.metadata
    }

    /// Builds the tool context for one request.
    pub fn context(&self, auth: AuthStrategy) -> ToolContext {
        ToolContext {
            gitlab: self.gitlab.with_auth(auth),
            server: Arc::clone(&self.metadata),
            sessions: self.sessions.clone(),
        }
    }

    /// Handles one raw JSON-RPC message.
    ///
    /// Returns `None` for notifications, otherwise the serialized response.
    /// Malformed input yields a JSON-RPC error response rather than `None`.
    pub async fn handle_message(&self, raw: &str, auth: AuthStrategy) -> Option<String> {
        let response = match parse_request(raw) {
            Ok(request) => {
                let ctx = self.context(auth);
                self.handle_request(request, &ctx).await?
            }
            Err((id, error)) => {
                tracing::debug!(code = error.code, "Rejecting malformed message");
                JsonRpcResponse::failure(id, error)
            }
        };

        serde_json::to_string(&response)
            .map_err(|e| tracing::error!("Failed to serialize response: {}", e))
            .ok()
    }

    /// Handles a parsed request.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ctx: &ToolContext,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        tracing::debug!(method = %request.method, "Handling request");
        let outcome = match request.method.as_str() {
            METHOD_INITIALIZE => self.initialize(request.params),
            METHOD_PING => Ok(Value::Object(Default::default())),
            METHOD_TOOLS_LIST => self.list_tools(),
            METHOD_TOOLS_CALL => self.call_tool(request.params, ctx).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        if request.method == METHOD_INITIALIZED {
            tracing::info!("Client initialized");
        } else {
            tracing::debug!(method = %request.method, "Ignoring notification");
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(value) => {
                serde_json::from_value(value).map_err(JsonRpcError::invalid_params)?
            }
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, "Client connecting");
        }

        let response = InitializeResponse {
            protocol_version: negotiate_protocol_version(params.protocol_version.as_deref())
                .to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: Implementation {
                name: self.metadata.app_name.clone(),
                version: self.metadata.version.clone(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        to_result(&response)
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListToolsResponse {
            tools: self.registry.all_definitions(),
        })
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        ctx: &ToolContext,
    ) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let params: CallToolParams =
            serde_json::from_value(params).map_err(JsonRpcError::invalid_params)?;

        let args = params.arguments.unwrap_or(Value::Null);
        let result = self
            .registry
            .dispatch(&params.name, ctx, args)
            .await
            .map_err(JsonRpcError::invalid_params)?;

        to_result(&CallToolResponse::from(result))
    }
}

fn parse_request(raw: &str) -> Result<JsonRpcRequest, (Value, JsonRpcError)> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| (Value::Null, JsonRpcError::parse_error(e)))?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if !value.is_object() {
        return Err((id, JsonRpcError::invalid_request("expected a JSON object")));
    }

    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| (id.clone(), JsonRpcError::invalid_request(e)))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err((id, JsonRpcError::invalid_request("jsonrpc must be \"2.0\"")));
    }

    Ok(request)
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        JsonRpcError::new(
            crate::server::protocol::INTERNAL_ERROR,
            format!("Internal error: {e}"),
        )
    })
}
