//! MCP tools exposed by the server
//!
//! Every tool implements [`ToolExecutor`] and is held in a [`ToolRegistry`].
//! Calls go through [`ToolRegistry::dispatch`], which applies the
//! [`middleware`] around each execution.
//!
//! # Module Layout
//!
//! ```text
//! tools/
//! ├── mod.rs         -- ToolResult, ToolExecutor, ToolContext, ToolRegistry
//! ├── middleware.rs  -- logging, timing and error conversion
//! ├── server.rs      -- ping, health_status, server_info, get_gitlab_config
//! └── gitlab/        -- one tool per GitLab endpoint
//! ```

pub mod gitlab;
pub mod middleware;
pub mod server;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{KeplerError, Result};
use crate::gitlab::GitLabClient;
use crate::oauth::session::SessionManager;

/// Outputs larger than this are cut before being returned to the client.
pub const MAX_OUTPUT_BYTES: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// ToolResult
// ---------------------------------------------------------------------------

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Whether the call succeeded
    pub success: bool,
    /// Output text, usually pretty-printed JSON
    pub output: String,
    /// Error message for failed calls
    pub error: Option<String>,
    /// Whether `output` was cut to [`MAX_OUTPUT_BYTES`]
    pub truncated: bool,
    /// Extra facts recorded by the middleware, such as `error_kind`
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    /// Creates a successful result.
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
            truncated: false,
            metadata: HashMap::new(),
        }
    }

    /// Creates a successful result holding pretty-printed JSON.
    pub fn json(value: &Value) -> Self {
        let output = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::success(output)
    }

    /// Creates a failed result.
    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            truncated: false,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Cuts `output` to at most `max_size` bytes on a char boundary.
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }

    /// Text sent back to the MCP client.
    pub fn to_message(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            self.error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ToolContext
// ---------------------------------------------------------------------------

/// Static facts about the running server, reported by the server tools.
#[derive(Debug, Clone)]
pub struct ServerMetadata {
    /// Configured application name
    pub app_name: String,
    /// Crate version
    pub version: String,
    /// Deployment environment
    pub environment: String,
    /// Active transport
    pub transport: String,
    /// GitLab base URL
    pub gitlab_url: String,
    /// Whether users sign in with OAuth
    pub user_auth_enabled: bool,
    /// Whether a service account is configured
    pub service_auth_enabled: bool,
    /// Outbound requests per minute per key
    pub rate_limit_requests_per_minute: u32,
    /// Outbound burst size per key
    pub rate_limit_burst: u32,
    /// Default page size for list tools
    pub default_per_page: u32,
    /// Default page cap for list tools
    pub max_pages: u32,
    /// Process start, for uptime
    pub started_at: Instant,
}

/// Per-request dependencies handed to every tool.
///
/// Built by the transport for each call; carries the GitLab client bound to
/// the caller's authentication strategy.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Client authenticated for this request
    pub gitlab: GitLabClient,
    /// Server facts
    pub server: Arc<ServerMetadata>,
    /// Session manager, when user OAuth is enabled
    pub sessions: Option<Arc<SessionManager>>,
}

// ---------------------------------------------------------------------------
// ToolExecutor
// ---------------------------------------------------------------------------

/// A callable MCP tool.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool name as listed to clients.
    fn name(&self) -> &str;

    /// MCP tool definition: `name`, `description` and `inputSchema`.
    fn tool_definition(&self) -> Value;

    /// Executes the tool.
    ///
    /// # Errors
    ///
    /// Any error is converted to an error [`ToolResult`] by the dispatch
    /// middleware.
    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolResult>;
}

/// Deserializes tool arguments into a parameter struct.
///
/// A `null` argument object is treated as `{}`.
///
/// # Errors
///
/// Returns [`KeplerError::Tool`] describing the invalid argument.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| KeplerError::Tool(format!("Invalid arguments: {e}")))
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Name-indexed set of tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every server and GitLab tool.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        server::register(&mut registry);
        gitlab::register(&mut registry);
        registry
    }

    /// Adds a tool, replacing one with the same name.
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(executor.name().to_string(), executor);
    }

    /// Looks up a tool.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Definitions of every tool, sorted by name.
    pub fn all_definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|executor| executor.tool_definition())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs a tool through the middleware.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Tool`] only when `name` is not registered;
    /// execution failures come back as error results.
    pub async fn dispatch(&self, name: &str, ctx: &ToolContext, args: Value) -> Result<ToolResult> {
        let executor = self
            .get(name)
            .ok_or_else(|| KeplerError::Tool(format!("Unknown tool: {name}")))?;
        Ok(middleware::run(executor.as_ref(), ctx, args).await)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::AuthStrategy;

    pub fn metadata() -> ServerMetadata {
        ServerMetadata {
            app_name: "Kepler MCP GitLab".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "local".to_string(),
            transport: "stdio".to_string(),
            gitlab_url: "https://gitlab.example.com".to_string(),
            user_auth_enabled: false,
            service_auth_enabled: false,
            rate_limit_requests_per_minute: 60,
            rate_limit_burst: 10,
            default_per_page: 20,
            max_pages: 10,
            started_at: Instant::now(),
        }
    }

    pub fn context(base_url: &str) -> ToolContext {
        ToolContext {
            gitlab: GitLabClient::new(base_url, reqwest::Client::new(), AuthStrategy::None)
                .unwrap(),
            server: Arc::new(metadata()),
            sessions: None,
        }
    }
}
