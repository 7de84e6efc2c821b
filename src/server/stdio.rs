//! Stdio transport
//!
//! Reads one JSON-RPC message per line from stdin and writes each response
//! as a single line to stdout. Logs go to stderr, so stdout carries protocol
//! traffic only.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::auth::AuthStrategy;
use crate::error::Result;
use crate::server::handler::McpServer;

/// Serves MCP over the process stdin/stdout until stdin closes.
///
/// # Errors
///
/// Returns [`KeplerError::Io`](crate::error::KeplerError::Io) if reading
/// stdin or writing stdout fails.
pub async fn serve_stdio(server: &McpServer, auth: AuthStrategy) -> Result<()> {
    tracing::info!(auth = auth.kind(), "Starting MCP server on stdio");
    serve_lines(server, auth, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serves newline-delimited JSON-RPC from `reader` to `writer`.
///
/// Blank lines are skipped. Returns when `reader` reaches end of input.
///
/// # Errors
///
/// Returns [`KeplerError::Io`](crate::error::KeplerError::Io) on read or
/// write failure.
pub async fn serve_lines<R, W>(
    server: &McpServer,
    auth: AuthStrategy,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = server.handle_message(line, auth.clone()).await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    tracing::info!("stdin closed, stopping stdio transport");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{test_support, ToolRegistry};
    use serde_json::Value;
    use std::sync::Arc;

    fn server() -> McpServer {
        let ctx = test_support::context("http://127.0.0.1:9");
        McpServer::new(
            Arc::new(ToolRegistry::with_default_tools()),
            ctx.server,
            ctx.gitlab,
            None,
        )
    }

    #[tokio::test]
    async fn test_serve_lines_answers_requests_and_skips_notifications() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"ping"}}"#,
            "\n",
        );
        let mut output = Vec::new();

        serve_lines(&server(), AuthStrategy::None, input.as_bytes(), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let responses: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["content"][0]["text"], "pong");
    }

    #[tokio::test]
    async fn test_serve_lines_reports_parse_errors_and_continues() {
        let input = "garbage\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n";
        let mut output = Vec::new();

        serve_lines(&server(), AuthStrategy::None, input.as_bytes(), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-32700"));
        assert!(lines[1].contains("\"id\":9"));
    }
}
