//! Tools describing the server itself

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry, ToolResult};

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}, "additionalProperties": false})
}

fn definition(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": no_arguments(),
    })
}

/// Registers the server tools.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(PingTool));
    registry.register(Arc::new(HealthStatusTool));
    registry.register(Arc::new(ServerInfoTool));
    registry.register(Arc::new(GitLabConfigTool));
}

/// Liveness check returning `pong`.
pub struct PingTool;

#[async_trait]
impl ToolExecutor for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn tool_definition(&self) -> Value {
        definition("ping", "Check that the server is responsive. Returns 'pong'.")
    }

    async fn execute(&self, _ctx: &ToolContext, _args: Value) -> Result<ToolResult> {
        Ok(ToolResult::success("pong".to_string()))
    }
}

/// Reports health, uptime and session counts.
pub struct HealthStatusTool;

#[async_trait]
impl ToolExecutor for HealthStatusTool {
    fn name(&self) -> &str {
        "health_status"
    }

    fn tool_definition(&self) -> Value {
        definition(
            "health_status",
            "Report server health, uptime and the number of active OAuth sessions.",
        )
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolResult> {
        let active_sessions = match &ctx.sessions {
            Some(sessions) => Some(sessions.get_session_count().await),
            None => None,
        };

        Ok(ToolResult::json(&json!({
            "status": "healthy",
            "app_name": ctx.server.app_name,
            "environment": ctx.server.environment,
            "uptime_seconds": ctx.server.started_at.elapsed().as_secs(),
            "active_sessions": active_sessions,
        })))
    }
}

/// Reports version, transport and authentication mode.
pub struct ServerInfoTool;

#[async_trait]
impl ToolExecutor for ServerInfoTool {
    fn name(&self) -> &str {
        "server_info"
    }

    fn tool_definition(&self) -> Value {
        definition(
            "server_info",
            "Describe this server: name, version, environment, transport and authentication mode.",
        )
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolResult> {
        let server = &ctx.server;
        Ok(ToolResult::json(&json!({
            "name": server.app_name,
            "version": server.version,
            "environment": server.environment,
            "transport": server.transport,
            "auth": {
                "user_oauth_enabled": server.user_auth_enabled,
                "service_auth_enabled": server.service_auth_enabled,
                "strategy": ctx.gitlab.auth().kind(),
            },
            "rate_limit": {
                "requests_per_minute": server.rate_limit_requests_per_minute,
                "burst": server.rate_limit_burst,
            },
        })))
    }
}

/// Reports the GitLab connection settings without credentials.
pub struct GitLabConfigTool;

#[async_trait]
impl ToolExecutor for GitLabConfigTool {
    fn name(&self) -> &str {
        "get_gitlab_config"
    }

    fn tool_definition(&self) -> Value {
        definition(
            "get_gitlab_config",
            "Show the GitLab instance URL and pagination defaults used by this server.",
        )
    }

    async fn execute(&self, ctx: &ToolContext, _args: Value) -> Result<ToolResult> {
        Ok(ToolResult::json(&json!({
            "gitlab_url": ctx.server.gitlab_url,
            "api_url": ctx.gitlab.api_url().as_str(),
            "default_per_page": ctx.server.default_per_page,
            "max_pages": ctx.server.max_pages,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;

    #[tokio::test]
    async fn test_ping_returns_pong() {
        let ctx = test_support::context("https://gitlab.example.com");
        let result = PingTool.execute(&ctx, Value::Null).await.unwrap();
        assert_eq!(result.output, "pong");
    }

    #[tokio::test]
    async fn test_health_status_without_sessions() {
        let ctx = test_support::context("https://gitlab.example.com");
        let result = HealthStatusTool.execute(&ctx, Value::Null).await.unwrap();
        let body: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(body["active_sessions"].is_null());
    }

    #[tokio::test]
    async fn test_gitlab_config_reports_api_url() {
        let ctx = test_support::context("https://gitlab.example.com");
        let result = GitLabConfigTool.execute(&ctx, Value::Null).await.unwrap();
        let body: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["api_url"], "https://gitlab.example.com/api/v4");
        assert_eq!(body["default_per_page"], 20);
    }

    #[tokio::test]
    async fn test_server_info_reports_strategy() {
        let ctx = test_support::context("https://gitlab.example.com");
        let result = ServerInfoTool.execute(&ctx, Value::Null).await.unwrap();
        let body: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["auth"]["strategy"], "none");
    }
}
