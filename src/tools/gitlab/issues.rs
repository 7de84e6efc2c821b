//! Issue tools

use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{object_schema, project_id_property, with_pagination, GitLabTool, PageArgs};
use crate::error::{KeplerError, Result};
use crate::gitlab::ProjectRef;
use crate::tools::{parse_args, ToolContext};

pub(super) fn tools() -> Vec<GitLabTool> {
    let issue_ref = json!({
        "project_id": project_id_property(),
        "issue_iid": {"type": "integer", "description": "Project-scoped issue number"}
    });

    vec![
        GitLabTool::new(
            "list_issues",
            "List issues in a project, optionally filtered by state, labels or search text.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "state": {"type": "string", "enum": ["opened", "closed", "all"]},
                    "labels": {"type": "string", "description": "Comma-separated label names"},
                    "search": {"type": "string"},
                    "assignee_username": {"type": "string"},
                    "milestone": {"type": "string"},
                    "order_by": {"type": "string", "enum": ["created_at", "updated_at", "priority", "due_date"]},
                    "sort": {"type": "string", "enum": ["asc", "desc"]}
                })),
                &["project_id"],
            ),
            |ctx, args| list_issues(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_issue",
            "Get a single issue.",
            object_schema(issue_ref.clone(), &["project_id", "issue_iid"]),
            |ctx, args| get_issue(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "create_issue",
            "Create an issue in a project.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "labels": {"type": "string", "description": "Comma-separated label names"},
                    "assignee_ids": {"type": "array", "items": {"type": "integer"}},
                    "milestone_id": {"type": "integer"},
                    "due_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "confidential": {"type": "boolean"}
                }),
                &["project_id", "title"],
            ),
            |ctx, args| create_issue(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "update_issue",
            "Update an issue. Set state_event to 'close' or 'reopen' to change its state.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "issue_iid": {"type": "integer"},
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "labels": {"type": "string"},
                    "assignee_ids": {"type": "array", "items": {"type": "integer"}},
                    "milestone_id": {"type": "integer"},
                    "due_date": {"type": "string"},
                    "state_event": {"type": "string", "enum": ["close", "reopen"]}
                }),
                &["project_id", "issue_iid"],
            ),
            |ctx, args| update_issue(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "close_issue",
            "Close an issue.",
            object_schema(issue_ref.clone(), &["project_id", "issue_iid"]),
            |ctx, args| close_issue(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "reopen_issue",
            "Reopen a closed issue.",
            object_schema(issue_ref.clone(), &["project_id", "issue_iid"]),
            |ctx, args| reopen_issue(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_issue_comments",
            "List comments (notes) on an issue.",
            object_schema(with_pagination(issue_ref.clone()), &["project_id", "issue_iid"]),
            |ctx, args| list_issue_comments(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "add_issue_comment",
            "Add a comment to an issue.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "issue_iid": {"type": "integer"},
                    "body": {"type": "string", "description": "Comment text in Markdown"}
                }),
                &["project_id", "issue_iid", "body"],
            ),
            |ctx, args| add_issue_comment(ctx, args).boxed(),
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct IssueFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListIssuesArgs {
    project_id: ProjectRef,
    #[serde(flatten)]
    filters: IssueFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct IssueArgs {
    project_id: ProjectRef,
    issue_iid: u64,
}

#[derive(Debug, Deserialize)]
struct ListIssueCommentsArgs {
    project_id: ProjectRef,
    issue_iid: u64,
    #[serde(flatten)]
    page: PageArgs,
}

/// Writable issue fields. `None` values are left out of the request body.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IssueFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteIssueArgs {
    project_id: ProjectRef,
    #[serde(default)]
    issue_iid: Option<u64>,
    #[serde(flatten)]
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    project_id: ProjectRef,
    issue_iid: u64,
    body: String,
}

async fn list_issues(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListIssuesArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_issues(&args.project_id, &args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_issue(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: IssueArgs = parse_args(args)?;
    ctx.gitlab.get_issue(&args.project_id, args.issue_iid).await
}

async fn create_issue(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: WriteIssueArgs = parse_args(args)?;
    if args.fields.title.as_deref().map_or(true, str::is_empty) {
        return Err(KeplerError::Tool(
            "Invalid arguments: title is required".to_string(),
        ));
    }
    ctx.gitlab.create_issue(&args.project_id, &args.fields).await
}

async fn update_issue(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: WriteIssueArgs = parse_args(args)?;
    let issue_iid = args.issue_iid.ok_or_else(|| {
        KeplerError::Tool("Invalid arguments: issue_iid is required".to_string())
    })?;
    ctx.gitlab
        .update_issue(&args.project_id, issue_iid, &args.fields)
        .await
}

async fn close_issue(ctx: ToolContext, args: Value) -> Result<Value> {
    set_issue_state(ctx, args, "close").await
}

async fn reopen_issue(ctx: ToolContext, args: Value) -> Result<Value> {
    set_issue_state(ctx, args, "reopen").await
}

async fn set_issue_state(ctx: ToolContext, args: Value, state_event: &str) -> Result<Value> {
    let args: IssueArgs = parse_args(args)?;
    let fields = IssueFields {
        state_event: Some(state_event.to_string()),
        ..IssueFields::default()
    };
    ctx.gitlab
        .update_issue(&args.project_id, args.issue_iid, &fields)
        .await
}

async fn list_issue_comments(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListIssueCommentsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_issue_notes(&args.project_id, args.issue_iid, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn add_issue_comment(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CommentArgs = parse_args(args)?;
    ctx.gitlab
        .create_issue_note(&args.project_id, args.issue_iid, &args.body)
        .await
}
