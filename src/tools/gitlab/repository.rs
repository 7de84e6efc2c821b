//! Repository tools: branches, tags, compare, tree, files and commits

use base64::Engine as _;
use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{object_schema, project_id_property, with_pagination, GitLabTool, PageArgs};
use crate::error::Result;
use crate::gitlab::ProjectRef;
use crate::tools::{parse_args, ToolContext};

pub(super) fn tools() -> Vec<GitLabTool> {
    let branch_ref = json!({
        "project_id": project_id_property(),
        "branch": {"type": "string", "description": "Branch name"}
    });
    let tag_ref = json!({
        "project_id": project_id_property(),
        "tag_name": {"type": "string"}
    });
    let commit_ref = json!({
        "project_id": project_id_property(),
        "sha": {"type": "string", "description": "Full or short commit SHA"}
    });
    let file_ref = json!({
        "project_id": project_id_property(),
        "file_path": {"type": "string", "description": "Path of the file, e.g. 'src/main.rs'"},
        "ref": {"type": "string", "description": "Branch, tag or SHA (default: HEAD)"}
    });

    vec![
        GitLabTool::new(
            "list_branches",
            "List repository branches, optionally filtered by a search string.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "search": {"type": "string"}
                })),
                &["project_id"],
            ),
            |ctx, args| list_branches(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "create_branch",
            "Create a branch from an existing branch, tag or commit.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "branch": {"type": "string", "description": "Name of the new branch"},
                    "ref": {"type": "string", "description": "Branch, tag or SHA to branch from"}
                }),
                &["project_id", "branch", "ref"],
            ),
            |ctx, args| create_branch(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_branch",
            "Get a branch with its head commit and protection flags.",
            object_schema(branch_ref.clone(), &["project_id", "branch"]),
            |ctx, args| get_branch(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "delete_branch",
            "Delete a branch.",
            object_schema(branch_ref, &["project_id", "branch"]),
            |ctx, args| delete_branch(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_tags",
            "List repository tags.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "search": {"type": "string"},
                    "order_by": {"type": "string", "enum": ["name", "updated", "version"]},
                    "sort": {"type": "string", "enum": ["asc", "desc"]}
                })),
                &["project_id"],
            ),
            |ctx, args| list_tags(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_tag",
            "Get a tag with its commit and release.",
            object_schema(tag_ref.clone(), &["project_id", "tag_name"]),
            |ctx, args| get_tag(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "create_tag",
            "Create a tag. A message makes it an annotated tag.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "tag_name": {"type": "string"},
                    "ref": {"type": "string", "description": "Branch, tag or SHA to tag"},
                    "message": {"type": "string"}
                }),
                &["project_id", "tag_name", "ref"],
            ),
            |ctx, args| create_tag(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "delete_tag",
            "Delete a tag.",
            object_schema(tag_ref, &["project_id", "tag_name"]),
            |ctx, args| delete_tag(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "compare_branches",
            "Compare two branches, tags or commits.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "from": {"type": "string", "description": "Base branch, tag or SHA"},
                    "to": {"type": "string", "description": "Target branch, tag or SHA"},
                    "straight": {"type": "boolean", "description": "Compare directly instead of from the merge base"}
                }),
                &["project_id", "from", "to"],
            ),
            |ctx, args| compare_branches(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_repository_tree",
            "List files and directories in a repository path.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "path": {"type": "string", "description": "Directory inside the repository"},
                    "ref": {"type": "string", "description": "Branch, tag or SHA"},
                    "recursive": {"type": "boolean"}
                })),
                &["project_id"],
            ),
            |ctx, args| list_repository_tree(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_file",
            "Get file metadata with base64 content, blob and last commit ids.",
            object_schema(file_ref.clone(), &["project_id", "file_path"]),
            |ctx, args| get_file(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_file_content",
            "Read a file from the repository at a given ref.",
            object_schema(file_ref.clone(), &["project_id", "file_path"]),
            |ctx, args| get_file_content(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "create_file",
            "Create a file on a branch with a commit.",
            object_schema(
                file_commit_properties(false),
                &["project_id", "file_path", "branch", "content", "commit_message"],
            ),
            |ctx, args| create_file(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "update_file",
            "Replace the content of a file on a branch with a commit.",
            object_schema(
                file_commit_properties(true),
                &["project_id", "file_path", "branch", "content", "commit_message"],
            ),
            |ctx, args| update_file(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "delete_file",
            "Delete a file from a branch with a commit.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "file_path": {"type": "string"},
                    "branch": {"type": "string"},
                    "commit_message": {"type": "string"},
                    "author_name": {"type": "string"},
                    "author_email": {"type": "string"}
                }),
                &["project_id", "file_path", "branch", "commit_message"],
            ),
            |ctx, args| delete_file(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_file_blame",
            "Show which commit last changed each line of a file.",
            object_schema(
                {
                    let mut props = file_ref;
                    if let Some(map) = props.as_object_mut() {
                        map.insert("range_start".to_string(), json!({"type": "integer", "minimum": 1}));
                        map.insert("range_end".to_string(), json!({"type": "integer", "minimum": 1}));
                    }
                    props
                },
                &["project_id", "file_path"],
            ),
            |ctx, args| get_file_blame(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "list_commits",
            "List commits on a ref, optionally limited by path or date range.",
            object_schema(
                with_pagination(json!({
                    "project_id": project_id_property(),
                    "ref_name": {"type": "string"},
                    "path": {"type": "string"},
                    "since": {"type": "string", "description": "ISO 8601 timestamp"},
                    "until": {"type": "string", "description": "ISO 8601 timestamp"}
                })),
                &["project_id"],
            ),
            |ctx, args| list_commits(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_commit",
            "Get a single commit by SHA.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "sha": {"type": "string"}
                }),
                &["project_id", "sha"],
            ),
            |ctx, args| get_commit(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_commit_diff",
            "Get the per-file diff of a commit.",
            object_schema(
                with_pagination(commit_ref.clone()),
                &["project_id", "sha"],
            ),
            |ctx, args| get_commit_diff(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "cherry_pick_commit",
            "Cherry-pick a commit onto a branch.",
            object_schema(
                json!({
                    "project_id": project_id_property(),
                    "sha": {"type": "string"},
                    "branch": {"type": "string", "description": "Target branch"},
                    "dry_run": {"type": "boolean", "description": "Only check that the pick applies"},
                    "message": {"type": "string"}
                }),
                &["project_id", "sha", "branch"],
            ),
            |ctx, args| cherry_pick_commit(ctx, args).boxed(),
        ),
        GitLabTool::new(
            "get_commit_refs",
            "List branches and tags that contain a commit.",
            object_schema(
                with_pagination({
                    let mut props = commit_ref;
                    if let Some(map) = props.as_object_mut() {
                        map.insert(
                            "type".to_string(),
                            json!({"type": "string", "enum": ["branch", "tag", "all"]}),
                        );
                    }
                    props
                }),
                &["project_id", "sha"],
            ),
            |ctx, args| get_commit_refs(ctx, args).boxed(),
        ),
    ]
}

fn file_commit_properties(with_last_commit: bool) -> Value {
    let mut props = json!({
        "project_id": project_id_property(),
        "file_path": {"type": "string"},
        "branch": {"type": "string"},
        "content": {"type": "string"},
        "commit_message": {"type": "string"},
        "encoding": {"type": "string", "enum": ["text", "base64"]},
        "author_name": {"type": "string"},
        "author_email": {"type": "string"}
    });
    if let (true, Some(map)) = (with_last_commit, props.as_object_mut()) {
        map.insert(
            "last_commit_id".to_string(),
            json!({"type": "string", "description": "Fail if the file changed since this commit"}),
        );
    }
    props
}

#[derive(Debug, Deserialize)]
struct ListBranchesArgs {
    project_id: ProjectRef,
    #[serde(default)]
    search: Option<String>,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct CreateBranchArgs {
    project_id: ProjectRef,
    branch: String,
    #[serde(rename = "ref")]
    from_ref: String,
}

#[derive(Debug, Deserialize)]
struct BranchArgs {
    project_id: ProjectRef,
    branch: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListTagsArgs {
    project_id: ProjectRef,
    #[serde(flatten)]
    filters: TagFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct TagArgs {
    project_id: ProjectRef,
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateTagArgs {
    project_id: ProjectRef,
    tag_name: String,
    #[serde(rename = "ref")]
    from_ref: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareArgs {
    project_id: ProjectRef,
    from: String,
    to: String,
    #[serde(default)]
    straight: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    git_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recursive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListTreeArgs {
    project_id: ProjectRef,
    #[serde(flatten)]
    filters: TreeFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct FileArgs {
    project_id: ProjectRef,
    file_path: String,
    #[serde(rename = "ref", default = "default_ref")]
    git_ref: String,
}

fn default_ref() -> String {
    "HEAD".to_string()
}

/// Body of a create or update file commit.
#[derive(Debug, Serialize, Deserialize)]
struct FileCommit {
    branch: String,
    content: String,
    commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    project_id: ProjectRef,
    file_path: String,
    #[serde(flatten)]
    commit: FileCommit,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileDeletion {
    branch: String,
    commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteFileArgs {
    project_id: ProjectRef,
    file_path: String,
    #[serde(flatten)]
    commit: FileDeletion,
}

#[derive(Debug, Serialize)]
struct BlameQuery {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(rename = "range[start]", skip_serializing_if = "Option::is_none")]
    range_start: Option<u32>,
    #[serde(rename = "range[end]", skip_serializing_if = "Option::is_none")]
    range_end: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BlameArgs {
    project_id: ProjectRef,
    file_path: String,
    #[serde(rename = "ref", default = "default_ref")]
    git_ref: String,
    #[serde(default)]
    range_start: Option<u32>,
    #[serde(default)]
    range_end: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommitFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListCommitsArgs {
    project_id: ProjectRef,
    #[serde(flatten)]
    filters: CommitFilters,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Deserialize)]
struct CommitArgs {
    project_id: ProjectRef,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitPageArgs {
    project_id: ProjectRef,
    sha: String,
    #[serde(flatten)]
    page: PageArgs,
}

#[derive(Debug, Serialize, Deserialize)]
struct CherryPickOptions {
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CherryPickArgs {
    project_id: ProjectRef,
    sha: String,
    #[serde(flatten)]
    options: CherryPickOptions,
}

#[derive(Debug, Deserialize)]
struct CommitRefsArgs {
    project_id: ProjectRef,
    sha: String,
    #[serde(rename = "type", default = "default_ref_type")]
    ref_type: String,
    #[serde(flatten)]
    page: PageArgs,
}

fn default_ref_type() -> String {
    "all".to_string()
}

async fn list_branches(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListBranchesArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_branches(
            &args.project_id,
            args.search.as_deref(),
            args.page.resolve(&ctx.server),
        )
        .await?;
    Ok(Value::Array(items))
}

async fn create_branch(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CreateBranchArgs = parse_args(args)?;
    ctx.gitlab
        .create_branch(&args.project_id, &args.branch, &args.from_ref)
        .await
}

async fn get_branch(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: BranchArgs = parse_args(args)?;
    ctx.gitlab.get_branch(&args.project_id, &args.branch).await
}

async fn delete_branch(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: BranchArgs = parse_args(args)?;
    ctx.gitlab.delete_branch(&args.project_id, &args.branch).await?;
    Ok(json!({"status": "deleted", "branch": args.branch}))
}

async fn list_tags(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListTagsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_tags(&args.project_id, &args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_tag(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: TagArgs = parse_args(args)?;
    ctx.gitlab.get_tag(&args.project_id, &args.tag_name).await
}

async fn create_tag(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CreateTagArgs = parse_args(args)?;
    ctx.gitlab
        .create_tag(
            &args.project_id,
            &args.tag_name,
            &args.from_ref,
            args.message.as_deref(),
        )
        .await
}

async fn delete_tag(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: TagArgs = parse_args(args)?;
    ctx.gitlab.delete_tag(&args.project_id, &args.tag_name).await?;
    Ok(json!({"status": "deleted", "tag": args.tag_name}))
}

async fn compare_branches(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CompareArgs = parse_args(args)?;
    ctx.gitlab
        .compare_refs(&args.project_id, &args.from, &args.to, args.straight)
        .await
}

async fn list_repository_tree(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListTreeArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_repository_tree(&args.project_id, &args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_file_content(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: FileArgs = parse_args(args)?;
    let file = ctx
        .gitlab
        .get_file(&args.project_id, &args.file_path, &args.git_ref)
        .await?;
    Ok(decode_file(file))
}

async fn get_file(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: FileArgs = parse_args(args)?;
    ctx.gitlab
        .get_file(&args.project_id, &args.file_path, &args.git_ref)
        .await
}

async fn create_file(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: WriteFileArgs = parse_args(args)?;
    ctx.gitlab
        .create_file(&args.project_id, &args.file_path, &args.commit)
        .await
}

async fn update_file(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: WriteFileArgs = parse_args(args)?;
    ctx.gitlab
        .update_file(&args.project_id, &args.file_path, &args.commit)
        .await
}

async fn delete_file(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: DeleteFileArgs = parse_args(args)?;
    ctx.gitlab
        .delete_file(&args.project_id, &args.file_path, &args.commit)
        .await?;
    Ok(json!({"status": "deleted", "file_path": args.file_path}))
}

async fn get_file_blame(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: BlameArgs = parse_args(args)?;
    let query = BlameQuery {
        git_ref: args.git_ref,
        range_start: args.range_start,
        range_end: args.range_end,
    };
    ctx.gitlab
        .get_file_blame(&args.project_id, &args.file_path, &query)
        .await
}

async fn list_commits(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: ListCommitsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .list_commits(&args.project_id, &args.filters, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn get_commit(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CommitArgs = parse_args(args)?;
    ctx.gitlab.get_commit(&args.project_id, &args.sha).await
}

async fn get_commit_diff(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CommitPageArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .get_commit_diff(&args.project_id, &args.sha, args.page.resolve(&ctx.server))
        .await?;
    Ok(Value::Array(items))
}

async fn cherry_pick_commit(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CherryPickArgs = parse_args(args)?;
    ctx.gitlab
        .cherry_pick_commit(&args.project_id, &args.sha, &args.options)
        .await
}

async fn get_commit_refs(ctx: ToolContext, args: Value) -> Result<Value> {
    let args: CommitRefsArgs = parse_args(args)?;
    let items = ctx
        .gitlab
        .get_commit_refs(
            &args.project_id,
            &args.sha,
            &args.ref_type,
            args.page.resolve(&ctx.server),
        )
        .await?;
    Ok(Value::Array(items))
}

/// Replaces base64 `content` with UTF-8 text when the file is text.
///
/// Binary files keep their base64 content and encoding.
fn decode_file(mut file: Value) -> Value {
    let is_base64 = file.get("encoding").and_then(Value::as_str) == Some("base64");
    let content = file.get("content").and_then(Value::as_str).map(|s| {
        s.chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>()
    });

    if let (true, Some(content)) = (is_base64, content) {
        let text = base64::engine::general_purpose::STANDARD
            .decode(content)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        if let (Some(text), Some(map)) = (text, file.as_object_mut()) {
            map.insert("content".to_string(), Value::String(text));
            map.insert("encoding".to_string(), Value::String("text".to_string()));
        }
    }
    file
}
