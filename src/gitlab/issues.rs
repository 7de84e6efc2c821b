//! Issue and issue note endpoints

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::gitlab::client::{GitLabClient, Pagination, ProjectRef, NO_QUERY};

impl GitLabClient {
    /// `GET /projects/:id/issues`
    pub async fn list_issues<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(&["projects", &project.to_string(), "issues"], filters, pagination)
            .await
    }

    /// `GET /projects/:id/issues/:iid`
    pub async fn get_issue(&self, project: &ProjectRef, issue_iid: u64) -> Result<Value> {
        self.get(
            &["projects", &project.to_string(), "issues", &issue_iid.to_string()],
            NO_QUERY,
        )
        .await
    }

    /// `POST /projects/:id/issues`
    pub async fn create_issue<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        fields: &B,
    ) -> Result<Value> {
        self.post(
            &["projects", &project.to_string(), "issues"],
            &serde_json::to_value(fields)?,
        )
        .await
    }

    /// `PUT /projects/:id/issues/:iid`. Use `state_event` to close or reopen.
    pub async fn update_issue<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        issue_iid: u64,
        fields: &B,
    ) -> Result<Value> {
        self.put(
            &["projects", &project.to_string(), "issues", &issue_iid.to_string()],
            &serde_json::to_value(fields)?,
        )
        .await
    }

    /// `GET /projects/:id/issues/:iid/notes`
    pub async fn list_issue_notes(
        &self,
        project: &ProjectRef,
        issue_iid: u64,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &[
                "projects",
                &project.to_string(),
                "issues",
                &issue_iid.to_string(),
                "notes",
            ],
            NO_QUERY,
            pagination,
        )
        .await
    }

    /// `POST /projects/:id/issues/:iid/notes`
    pub async fn create_issue_note(
        &self,
        project: &ProjectRef,
        issue_iid: u64,
        body: &str,
    ) -> Result<Value> {
        self.post(
            &[
                "projects",
                &project.to_string(),
                "issues",
                &issue_iid.to_string(),
                "notes",
            ],
            &json!({ "body": body }),
        )
        .await
    }
}
