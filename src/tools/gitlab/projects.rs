//! Project and user tools

use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{object_schema, project_id_property, with_pagination, GitLabTool, PageArgs};
use crate::error::Result;
use crate::gitlab::ProjectRef;
use crate::tools::{parse_args, ToolContext};

pub(super) fn tools() -> Vec<GitLabTool> {
    vec![
        GitLabTool::new(
            "get_current_user",
            "Get the profile of the GitLab user the server is acting as.",
            object_schema(json!({}), &[]),
            |ctx, args| get_current_user(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_projects",
            "List projects visible to the current user, optionally filtered.",
            object_schema(
                with_pagination(json!({
                    "search": {"type": "string", "description": "Match against project name or path"},
                    "owned": {"type": "boolean", "description": "Only projects owned by the current user"},
                    "membership": {"type": "boolean", "description": "Only projects the current user is a member of"},
                    "visibility": {"type": "string", "enum": ["public", "internal", "private"]},
                    "archived": {"type": "boolean"},
                    "order_by": {"type": "string", "enum": ["id", "name", "path", "created_at", "updated_at", "last_activity_at"]},
                    "sort": {"type": "string", "enum": ["asc", "desc"]}
                })),
                &[],
            ),
            |ctx, args| list_projects(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_project",
            "Get a single project by ID or path.",
            object_schema(json!({"project_id": project_id_property()}), &["project_id"]),
            |ctx, args| get_project(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "search_projects",
            "Search projects by name or path.",
            object_schema(
                with_pagination(json!({
                    "query": {"type": "string", "description": "Text to match against project name or path"}
                })),
                &["query"],
            ),
            |ctx, args| search_projects(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_project_languages",
            "Get the language breakdown of a project's repository, in percent.",
            object_schema(json!({"project_id": project_id_property()}), &["project_id"]),
            |ctx, args| get_project_languages(ctx, args).boxed(),
        ),
    ]
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    membership: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListProjectsArgs {
    #[serde(flatten)]
    filters: ProjectFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct SearchProjectsArgs {
    query: String,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct ProjectArgs {
    project_id: ProjectRef,
}

async fn get_current_user(ctx: ToolContext, _args: Value) -> Result<Value> {
    ctx.gitlab.current_user().await
}

async fn list_projects(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListProjectsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_projects(&args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn search_projects(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: SearchProjectsArgs = parse_args(args)?;
    let filters = ProjectFilters {
        search: Some(args.query),
        ..ProjectFilters::default()
    };
    let items = ctx
        .gitlab
        .list_projects(&filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_project(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ProjectArgs = parse_args(args)?;
    ctx.gitlab.get_project(&args.project_id).await
}

async fn get_project_languages(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ProjectArgs = parse_args(args)?;
    ctx.gitlab.get_project_languages(&args.project_id).await
}
