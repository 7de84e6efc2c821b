//! Repository endpoints: branches, tags, compare, tree, files and commits

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::gitlab::client::{GitLabClient, Pagination, ProjectRef, NO_QUERY};

impl GitLabClient {
    /// `GET /projects/:id/repository/branches`
    pub async fn list_branches(
        &self,
        project: &ProjectRef,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let query: Vec<(&str, &str)> = search.map(|s| ("search", s)).into_iter().collect();
        self.paginate(
            &["projects", &project.to_string(), "repository", "branches"],
            &query,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/repository/branches/:branch`
    pub async fn get_branch(&self, project: &ProjectRef, branch: &str) -> Result<Value> {
        self.get(
            &["projects", &project.to_string(), "repository", "branches", branch],
            NO_QUERY,
        )
        .await
    }

    /// `DELETE /projects/:id/repository/branches/:branch`
    pub async fn delete_branch(&self, project: &ProjectRef, branch: &str) -> Result<()> {
        self.delete(&["projects", &project.to_string(), "repository", "branches", branch])
            .await?;
        Ok(())
    }

    /// `POST /projects/:id/repository/branches`
    pub async fn create_branch(
        &self,
        project: &ProjectRef,
        branch: &str,
        from_ref: &str,
    ) -> Result<Value> {
        self.post(
            &["projects", &project.to_string(), "repository", "branches"],
            &json!({ "branch": branch, "ref": from_ref }),
        )
        .await
    }

    /// `GET /projects/:id/repository/tree`
    pub async fn list_repository_tree<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "repository", "tree"],
            filters,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/repository/files/:file_path`
    ///
    /// The response carries the file as base64 in `content`.
    pub async fn get_file(
        &self,
        project: &ProjectRef,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Value> {
        self.get(
            &[
                "projects",
                &project.to_string(),
                "repository",
                "files",
                file_path,
            ],
            &[("ref", git_ref)],
        )
        .await
    }

    /// `GET /projects/:id/repository/commits`
    pub async fn list_commits<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "repository", "commits"],
            filters,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/repository/commits/:sha`
    pub async fn get_commit(&self, project: &ProjectRef, sha: &str) -> Result<Value> {
        self.get(
            &["projects", &project.to_string(), "repository", "commits", sha],
            NO_QUERY,
        )
        .await
    }

    /// `GET /projects/:id/repository/commits/:sha/diff`
    pub async fn get_commit_diff(
        &self,
        project: &ProjectRef,
        sha: &str,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "repository", "commits", sha, "diff"],
            NO_QUERY,
            pagination,
        )
        .await
    }

    /// `POST /projects/:id/repository/commits/:sha/cherry_pick`
    pub async fn cherry_pick_commit<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        sha: &str,
        options: &B,
    ) -> Result<Value> {
        self.post(
            &[
                "projects",
                &project.to_string(),
                "repository",
                "commits",
                sha,
                "cherry_pick",
            ],
            &serde_json::to_value(options)?,
        )
        .await
    }

    /// `GET /projects/:id/repository/commits/:sha/refs`
    ///
    /// `ref_type` is `branch`, `tag` or `all`.
    pub async fn get_commit_refs(
        &self,
        project: &ProjectRef,
        sha: &str,
        ref_type: &str,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "repository", "commits", sha, "refs"],
            &[("type", ref_type)],
            pagination,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// `GET /projects/:id/repository/tags`
    pub async fn list_tags<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "repository", "tags"],
            filters,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/repository/tags/:tag_name`
    pub async fn get_tag(&self, project: &ProjectRef, tag: &str) -> Result<Value> {
        self.get(
            &["projects", &project.to_string(), "repository", "tags", tag],
            NO_QUERY,
        )
        .await
    }

    /// `POST /projects/:id/repository/tags`
    ///
    /// A `message` makes the tag annotated.
    pub async fn create_tag(
        &self,
        project: &ProjectRef,
        tag: &str,
        from_ref: &str,
        message: Option<&str>,
    ) -> Result<Value> {
        let mut body = json!({ "tag_name": tag, "ref": from_ref });
        if let (Some(message), Some(map)) = (message, body.as_object_mut()) {
            map.insert("message".to_string(), Value::String(message.to_string()));
        }
        self.post(
            &["projects", &project.to_string(), "repository", "tags"],
            &body,
        )
        .await
    }

    /// `DELETE /projects/:id/repository/tags/:tag_name`
    pub async fn delete_tag(&self, project: &ProjectRef, tag: &str) -> Result<()> {
        self.delete(&["projects", &project.to_string(), "repository", "tags", tag])
            .await?;
        Ok(())
    }

    /// `GET /projects/:id/repository/compare?from=..&to=..`
    pub async fn compare_refs(
        &self,
        project: &ProjectRef,
        from_ref: &str,
        to_ref: &str,
        straight: bool,
    ) -> Result<Value> {
        let straight = straight.to_string();
        self.get(
            &["projects", &project.to_string(), "repository", "compare"],
            &[("from", from_ref), ("to", to_ref), ("straight", straight.as_str())],
        )
        .await
    }

    // -----------------------------------------------------------------------
    // File writes
    // -----------------------------------------------------------------------

    /// `POST /projects/:id/repository/files/:file_path`
    pub async fn create_file<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        file_path: &str,
        commit: &B,
    ) -> Result<Value> {
        self.post(
            &["projects", &project.to_string(), "repository", "files", file_path],
            &serde_json::to_value(commit)?,
        )
        .await
    }

    /// `PUT /projects/:id/repository/files/:file_path`
    pub async fn update_file<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        file_path: &str,
        commit: &B,
    ) -> Result<Value> {
        self.put(
            &["projects", &project.to_string(), "repository", "files", file_path],
            &serde_json::to_value(commit)?,
        )
        .await
    }

    /// `DELETE /projects/:id/repository/files/:file_path`
    ///
    /// The branch and commit message travel as query parameters.
    pub async fn delete_file<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        file_path: &str,
        commit: &Q,
    ) -> Result<()> {
        self.request(
            Method::DELETE,
            &["projects", &project.to_string(), "repository", "files", file_path],
            commit,
            None,
        )
        .await?;
        Ok(())
    }

    /// `GET /projects/:id/repository/files/:file_path/blame`
    pub async fn get_file_blame<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        file_path: &str,
        query: &Q,
    ) -> Result<Value> {
        self.get(
            &[
                "projects",
                &project.to_string(),
                "repository",
                "files",
                file_path,
                "blame",
            ],
            query,
        )
        .await
    }
}
