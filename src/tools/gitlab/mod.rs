//! GitLab API tools
//!
//! Each tool is a [`GitLabTool`]: a name, a description, a JSON input schema
//! and a handler that parses its arguments and calls one
//! [`GitLabClient`](crate::gitlab::GitLabClient) endpoint method.

mod issues;
mod merge_requests;
mod projects;
mod repository;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::gitlab::Pagination;
use crate::tools::{ServerMetadata, ToolContext, ToolExecutor, ToolRegistry, ToolResult};

/// Handler signature shared by all GitLab tools.
pub type Handler = fn(ToolContext, Value) -> BoxFuture<'static, Result<Value>>;

/// A tool backed by one GitLab endpoint.
pub struct GitLabTool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    handler: Handler,
}

impl GitLabTool {
    /// Creates a tool.
    pub fn new(
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            description,
            input_schema,
            handler,
        }
    }
}

#[async_trait]
impl ToolExecutor for GitLabTool {
    fn name(&self) -> &str {
        self.name
    }

    fn tool_definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolResult> {
        let value = (self.handler)(ctx.clone(), args).await?;
        Ok(ToolResult::json(&value))
    }
}

/// Registers every GitLab tool.
pub fn register(registry: &mut ToolRegistry) {
    let tools = projects::tools()
        .into_iter()
        .chain(issues::tools())
        .chain(merge_requests::tools())
        .chain(repository::tools());

    for tool in tools {
        registry.register(Arc::new(tool));
    }
}

// ---------------------------------------------------------------------------
// Shared argument handling
// ---------------------------------------------------------------------------

/// Pagination arguments accepted by list tools.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageArgs {
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    max_pages: Option<u32>,
}

impl PageArgs {
    /// Fills unset values from the server defaults.
    pub fn resolve(&self, server: &ServerMetadata) -> Pagination {
        Pagination {
            per_page: self.per_page.unwrap_or(server.default_per_page),
            page: self.page,
            max_pages: self.max_pages.unwrap_or(server.max_pages),
        }
    }
}

/// Builds an object schema from `properties` and `required` names.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Adds `per_page`, `page` and `max_pages` to a properties object.
pub(crate) fn with_pagination(mut properties: Value) -> Value {
    if let Value::Object(map) = &mut properties {
        map.extend(pagination_properties());
    }
    properties
}

fn pagination_properties() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "per_page".to_string(),
        json!({"type": "integer", "minimum": 1, "maximum": 100, "description": "Items per page"}),
    );
    map.insert(
        "page".to_string(),
        json!({"type": "integer", "minimum": 1, "description": "Fetch only this page"}),
    );
    map.insert(
        "max_pages".to_string(),
        json!({"type": "integer", "minimum": 1, "description": "Maximum pages to fetch when page is not set"}),
    );
    map
}

/// Schema for a `project_id` property.
pub(crate) fn project_id_property() -> Value {
    json!({
        "type": ["integer", "string"],
        "description": "Project ID or full path, e.g. 'group/project'"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;

    #[test]
    fn test_every_tool_has_object_schema() {
        let mut registry = ToolRegistry::new();
        register(&mut registry);
        assert!(registry.len() >= 45);
        for name in [
            "reopen_issue",
            "search_projects",
            "approve_merge_request",
            "resolve_merge_request_discussion",
            "create_file",
            "delete_file",
            "compare_branches",
            "cherry_pick_commit",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }

        for definition in registry.all_definitions() {
            let name = definition["name"].as_str().unwrap();
            assert_eq!(definition["inputSchema"]["type"], "object", "tool {name}");
            assert!(
                !definition["description"].as_str().unwrap().is_empty(),
                "tool {name}"
            );
        }
    }

    #[test]
    fn test_page_args_fall_back_to_server_defaults() {
        let server = test_support::metadata();
        let args: PageArgs = serde_json::from_value(json!({"per_page": 50})).unwrap();
        let pagination = args.resolve(&server);
        assert_eq!(pagination.per_page, 50);
        assert_eq!(pagination.max_pages, server.max_pages);
        assert_eq!(pagination.page, None);
    }

    #[test]
    fn test_with_pagination_keeps_existing_properties() {
        let props = with_pagination(json!({"search": {"type": "string"}}));
        assert!(props.get("search").is_some());
        assert!(props.get("per_page").is_some());
    }
}
