//! Merge request tools

use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{object_schema, project_id_property, with_pagination, GitLabTool, PageArgs};
use crate::error::Result;
use crate::gitlab::ProjectRef;
use crate::tools::{parse_args, ToolContext};

pub(super) fn tools() -> Vec<GitLabTool> {
    let mr_ref = json!({
        "project_id": project_id_property(),
        "merge_request_iid": {"type": "integer", "description": "Project-scoped merge request number"}
    });

    vec![
        GitLabTool::new(
            "list_merge_requests",
            "List merge requests in a project.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "state": {"type": "string", "enum": ["opened", "closed", "locked", "merged", "all"]},
                    "source_branch": {"type": "string"},
                    "target_branch": {"type": "string"},
                    "labels": {"type": "string"},
                    "search": {"type": "string"},
                    "order_by": {"type": "string", "enum": ["created_at", "updated_at"]},
                    "sort": {"type": "string", "enum": ["asc", "desc"]}
                })),
                &["project_id"],
            ),
            |ctx, args| list_merge_requests(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_merge_request",
            "Get a single merge request.",
            object_schema(mr_ref.clone(), &["project_id", "merge_request_iid"]),
            |ctx, args| get_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "create_merge_request",
            "Open a merge request from a source branch into a target branch.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "source_branch": {"type": "string"},
                    "target_branch": {"type": "string"},
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "labels": {"type": "string"},
                    "assignee_ids": {"type": "array", "items": {"type": "integer"}},
                    "reviewer_ids": {"type": "array", "items": {"type": "integer"}},
                    "remove_source_branch": {"type": "boolean"},
                    "squash": {"type": "boolean"},
                    "draft": {"type": "boolean"}
                }),
                &["project_id", "source_branch", "target_branch", "title"],
            ),
            |ctx, args| create_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "merge_merge_request",
            "Accept and merge a merge request.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "merge_commit_message": {"type": "string"},
                    "squash": {"type": "boolean"},
                    "should_remove_source_branch": {"type": "boolean"},
                    "sha": {"type": "string", "description": "Merge only if HEAD matches this SHA"}
                }),
                &["project_id", "merge_request_iid"],
            ),
            |ctx, args| merge_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_merge_request_changes",
            "Get the diff of a merge request.",
            object_schema(mr_ref.clone(), &["project_id", "merge_request_iid"]),
            |ctx, args| get_merge_request_changes(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "add_merge_request_comment",
            "Add a comment to a merge request.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "body": {"type": "string", "description": "Comment text in Markdown"}
                }),
                &["project_id", "merge_request_iid", "body"],
            ),
            |ctx, args| add_merge_request_comment(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "update_merge_request",
            "Update a merge request. Set state_event to 'close' or 'reopen' to change its state.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "state_event": {"type": "string", "enum": ["close", "reopen"]},
                    "target_branch": {"type": "string"},
                    "labels": {"type": "string"},
                    "assignee_ids": {"type": "array", "items": {"type": "integer"}},
                    "reviewer_ids": {"type": "array", "items": {"type": "integer"}},
                    "milestone_id": {"type": "integer", "description": "0 removes the milestone"},
                    "remove_source_branch": {"type": "boolean"},
                    "squash": {"type": "boolean"}
                }),
                &["project_id", "merge_request_iid"],
            ),
            |ctx, args| update_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "approve_merge_request",
            "Approve a merge request as the current user.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "sha": {"type": "string", "description": "Approve only if HEAD matches this SHA"}
                }),
                &["project_id", "merge_request_iid"],
            ),
            |ctx, args| approve_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "unapprove_merge_request",
            "Withdraw the current user's approval of a merge request.",
            object_schema(mr_ref.clone(), &["project_id", "merge_request_iid"]),
            |ctx, args| unapprove_merge_request(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_merge_request_comments",
            "List comments (notes) on a merge request.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "order_by": {"type": "string", "enum": ["created_at", "updated_at"]},
                    "sort": {"type": "string", "enum": ["asc", "desc"]}
                })),
                &["project_id", "merge_request_iid"],
            ),
            |ctx, args| list_merge_request_comments(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_merge_request_discussions",
            "List discussion threads on a merge request.",
            object_schema(
                with_pagination(mr_ref.clone()),
                &["project_id", "merge_request_iid"],
            ),
            |ctx, args| list_merge_request_discussions(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "resolve_merge_request_discussion",
            "Resolve or unresolve a discussion thread on a merge request.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "merge_request_iid": {"type": "integer"},
                    "discussion_id": {"type": "string"},
                    "resolved": {"type": "boolean", "description": "false reopens the thread (default: true)"}
                }),
                &["project_id", "merge_request_iid", "discussion_id"],
            ),
            |ctx, args| resolve_merge_request_discussion(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_merge_request_participants",
            "List users who took part in a merge request.",
            object_schema(mr_ref, &["project_id", "merge_request_iid"]),
            |ctx, args| get_merge_request_participants(ctx, args).boxed(),
        ),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct MergeRequestFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListMergeRequestsArgs {
    project_id: ProjectRef,
    #[serde(flatten)]
    filters: MergeRequestFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct MergeRequestArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct NewMergeRequest {
    source_branch: String,
    target_branch: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewer_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_source_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    squash: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CreateMergeRequestArgs {
    project_id: ProjectRef,
    #[serde(default)]
    draft: bool,
    #[serde(flatten)]
    fields: NewMergeRequest,
}

#[derive(Debug, Serialize, Deserialize)]
struct MergeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    merge_commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    squash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    should_remove_source_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    #[serde(flatten)]
    options: MergeOptions,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    body: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MergeRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reviewer_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_source_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    squash: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct UpdateMergeRequestArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    #[serde(flatten)]
    fields: MergeRequestUpdate,
}

#[derive(Debug, Deserialize)]
struct ApproveArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteOrdering {
    #[serde(default = "default_note_order_by")]
    order_by: String,
    #[serde(default = "default_note_sort")]
    sort: String,
}

fn default_note_order_by() -> String {
    "created_at".to_string()
}

fn default_note_sort() -> String {
    "desc".to_string()
}

#[derive(Debug, Deserialize)]
struct ListCommentsArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    #[serde(flatten)]
    ordering: NoteOrdering,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct ListDiscussionsArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct ResolveDiscussionArgs {
    project_id: ProjectRef,
    merge_request_iid: u64,
    discussion_id: String,
    #[serde(default = "resolved_by_default")]
    resolved: bool,
}

fn resolved_by_default() -> bool {
    true
}

async fn list_merge_requests(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListMergeRequestsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_merge_requests(&args.project_id, &args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: MergeRequestArgs = parse_args(args)?;
    ctx.gitlab
        .get_merge_request(&args.project_id, args.merge_request_iid)
        .await
}

async fn create_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let mut args: CreateMergeRequestArgs = parse_args(args)?;
    if args.draft && !args.fields.title.starts_with("Draft:") {
        args.fields.title = format!("Draft: {}", args.fields.title);
    }
    ctx.gitlab
        .create_merge_request(&args.project_id, &args.fields)
        .await
}

async fn merge_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: MergeArgs = parse_args(args)?;
    ctx.gitlab
        .merge_merge_request(&args.project_id, args.merge_request_iid, &args.options)
        .await
}

async fn get_merge_request_changes(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: MergeRequestArgs = parse_args(args)?;
    ctx.gitlab
        .get_merge_request_changes(&args.project_id, args.merge_request_iid)
        .await
}

async fn add_merge_request_comment(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CommentArgs = parse_args(args)?;
    ctx.gitlab
        .create_merge_request_note(&args.project_id, args.merge_request_iid, &args.body)
        .await
}

async fn update_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: UpdateMergeRequestArgs = parse_args(args)?;
    ctx.gitlab
        .update_merge_request(&args.project_id, args.merge_request_iid, &args.fields)
        .await
}

async fn approve_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ApproveArgs = parse_args(args)?;
    ctx.gitlab
        .approve_merge_request(&args.project_id, args.merge_request_iid, args.sha.as_deref())
        .await
}

async fn unapprove_merge_request(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: MergeRequestArgs = parse_args(args)?;
    ctx.gitlab
        .unapprove_merge_request(&args.project_id, args.merge_request_iid)
        .await
}

async fn list_merge_request_comments(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListCommentsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_merge_request_notes(
            &args.project_id,
            args.merge_request_iid,
            &args.ordering,
            args.page.resolve(&ctx.server),
        )
        .await?;
    Ok(Value::Array(items))
}

async fn list_merge_request_discussions(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListDiscussionsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_merge_request_discussions(
            &args.project_id,
            args.merge_request_iid,
            args.page.resolve(&ctx.server),
        )
        .await?;
    Ok(Value::Array(items))
}

async fn resolve_merge_request_discussion(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ResolveDiscussionArgs = parse_args(args)?;
    ctx.gitlab
        .resolve_merge_request_discussion(
            &args.project_id,
            args.merge_request_iid,
            &args.discussion_id,
            args.resolved,
        )
        .await
}

async fn get_merge_request_participants(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: MergeRequestArgs = parse_args(args)?;
    ctx.gitlab
        .get_merge_request_participants(&args.project_id, args.merge_request_iid)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_args_require_branches_and_title() {
        let err = parse_args::<CreateMergeRequestArgs>(json!({
            "project_id": 1,
            "source_branch": "feature"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Invalid arguments"));
    }

    #[test]
    fn test_draft_flag_is_not_sent_as_field() {
        let args: CreateMergeRequestArgs = parse_args(json!({
            "project_id": 1,
            "source_branch": "feature",
            "target_branch": "main",
            "title": "Add login",
            "draft": true
        }))
        .unwrap();
        assert!(args.draft);
        let body = serde_json::to_value(&args.fields).unwrap();
        assert!(body.get("draft").is_none());
    }

    #[test]
    fn test_update_sends_only_given_fields() {
        let args: UpdateMergeRequestArgs = parse_args(json!({
            "project_id": "group/app",
            "merge_request_iid": 4,
            "state_event": "close",
            "reviewer_ids": [3]
        }))
        .unwrap();
        let body = serde_json::to_value(&args.fields).unwrap();
        assert_eq!(body, json!({"state_event": "close", "reviewer_ids": [3]}));
    }

    #[test]
    fn test_discussions_resolve_by_default_and_notes_sort_newest_first() {
        let resolve: ResolveDiscussionArgs = parse_args(json!({
            "project_id": 1,
            "merge_request_iid": 2,
            "discussion_id": "abc"
        }))
        .unwrap();
        assert!(resolve.resolved);

        let comments: ListCommentsArgs =
            parse_args(json!({"project_id": 1, "merge_request_iid": 2})).unwrap();
        let query = serde_json::to_value(&comments.ordering).unwrap();
        assert_eq!(query, json!({"order_by": "created_at", "sort": "desc"}));
    }
}
