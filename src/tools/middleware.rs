//! Cross-cutting behaviour applied to every tool call
//!
//! Logs the call with credentials masked, times it, converts failures into
//! error results the client can read, and caps output size. Tools only deal
//! with their own parameters and return `Result`.

use std::time::Instant;

use serde_json::Value;

use crate::error::KeplerError;
use crate::security::mask_sensitive_data;
use crate::tools::{ToolContext, ToolExecutor, ToolResult, MAX_OUTPUT_BYTES};

/// Runs `executor` with logging, timing and error conversion.
pub async fn run(executor: &dyn ToolExecutor, ctx: &ToolContext, args: Value) -> ToolResult {
    let tool = executor.name().to_string();
    let masked = mask_sensitive_data(&args);
    tracing::info!(tool = %tool, args = %masked, auth = ctx.gitlab.auth().kind(), "Calling tool");

    let started = Instant::now();
    let outcome = executor.execute(ctx, args).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(result) => {
            tracing::debug!(tool = %tool, elapsed_ms, success = result.success, "Tool finished");
            result
        }
        Err(e) => {
            tracing::warn!(tool = %tool, elapsed_ms, error = %e, "Tool failed");
            error_result(&e)
        }
    };

    result
        .truncate_if_needed(MAX_OUTPUT_BYTES)
        .with_metadata("elapsed_ms", elapsed_ms.to_string())
}

/// Converts an error into a client-facing result.
pub fn error_result(error: &KeplerError) -> ToolResult {
    if let Some(payload) = error.rate_limit_payload() {
        return ToolResult::error(payload.to_string()).with_metadata("error_kind", "rate_limited");
    }

    if error.requires_reauthentication() {
        return ToolResult::error(format!(
            "{error}. Sign in again at /oauth/authorize to continue."
        ))
        .with_metadata("error_kind", "authentication");
    }

    let kind = match error {
        KeplerError::GitLab(_) => "gitlab",
        KeplerError::OAuth(_) => "oauth",
        KeplerError::Tool(_) => "invalid_arguments",
        KeplerError::Http(_) => "transport",
        _ => "internal",
    };
    ToolResult::error(error.to_string()).with_metadata("error_kind", kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GitLabError, Result};
    use crate::tools::test_support;
    use async_trait::async_trait;
    use serde_json::json;

    struct Failing(fn() -> KeplerError);

    #[async_trait]
    impl ToolExecutor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn tool_definition(&self) -> Value {
            json!({"name": "failing"})
        }

        async fn execute(&self, _ctx: &ToolContext, _args: Value) -> Result<ToolResult> {
            Err((self.0)())
        }
    }

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn tool_definition(&self) -> Value {
            json!({"name": "echo"})
        }

        async fn execute(&self, _ctx: &ToolContext, args: Value) -> Result<ToolResult> {
            Ok(ToolResult::json(&args))
        }
    }

    #[tokio::test]
    async fn test_errors_become_error_results() {
        let ctx = test_support::context("https://gitlab.example.com");
        let tool = Failing(|| GitLabError::NotFound("404 Project Not Found".into()).into());

        let result = run(&tool, &ctx, json!({})).await;

        assert!(!result.success);
        assert!(result.to_message().contains("404 Project Not Found"));
        assert_eq!(result.metadata["error_kind"], "gitlab");
        assert!(result.metadata.contains_key("elapsed_ms"));
    }

    #[tokio::test]
    async fn test_rate_limit_error_carries_payload() {
        let ctx = test_support::context("https://gitlab.example.com");
        let tool = Failing(|| KeplerError::RateLimited { retry_after: 3.0 });

        let result = run(&tool, &ctx, json!({})).await;
        let payload: Value = serde_json::from_str(&result.to_message()).unwrap();

        assert_eq!(payload["error"], "rate_limit_exceeded");
        assert_eq!(payload["retry_after"], 3.0);
    }

    #[tokio::test]
    async fn test_session_error_points_to_reauthentication() {
        let ctx = test_support::context("https://gitlab.example.com");
        let tool = Failing(|| KeplerError::Session("Invalid or expired session".into()));

        let result = run(&tool, &ctx, json!({})).await;

        assert_eq!(result.metadata["error_kind"], "authentication");
        assert!(result.to_message().contains("/oauth/authorize"));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let ctx = test_support::context("https://gitlab.example.com");
        let result = run(&Echo, &ctx, json!({"a": 1})).await;
        assert!(result.success);
        assert!(result.output.contains("\"a\": 1"));
    }
}
