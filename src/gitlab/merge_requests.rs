//! Merge request endpoints

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::gitlab::client::{GitLabClient, Pagination, ProjectRef, NO_QUERY};

impl GitLabClient {
    fn merge_request_path<'a>(
        project: &'a str,
        mr_iid: &'a str,
        tail: &[&'a str],
    ) -> Vec<&'a str> {
        let mut segments = vec!["projects", project, "merge_requests", mr_iid];
        segments.extend_from_slice(tail);
        segments
    }

    /// `GET /projects/:id/merge_requests`
    pub async fn list_merge_requests<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(
            &["projects", &project.to_string(), "merge_requests"],
            filters,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/merge_requests/:iid`
    pub async fn get_merge_request(&self, project: &ProjectRef, mr_iid: u64) -> Result<Value> {
        self.get(
            &[
                "projects",
                &project.to_string(),
                "merge_requests",
                &mr_iid.to_string(),
            ],
            NO_QUERY,
        )
        .await
    }

    /// `POST /projects/:id/merge_requests`
    pub async fn create_merge_request<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        fields: &B,
    ) -> Result<Value> {
        self.post(
            &["projects", &project.to_string(), "merge_requests"],
            &serde_json::to_value(fields)?,
        )
        .await
    }

    /// `PUT /projects/:id/merge_requests/:iid/merge`
    pub async fn merge_merge_request<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        options: &B,
    ) -> Result<Value> {
        self.put(
            &[
                "projects",
                &project.to_string(),
                "merge_requests",
                &mr_iid.to_string(),
                "merge",
            ],
            &serde_json::to_value(options)?,
        )
        .await
    }

    /// `GET /projects/:id/merge_requests/:iid/changes`
    pub async fn get_merge_request_changes(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
    ) -> Result<Value> {
        self.get(
            &[
                "projects",
                &project.to_string(),
                "merge_requests",
                &mr_iid.to_string(),
                "changes",
            ],
            NO_QUERY,
        )
        .await
    }

    /// `POST /projects/:id/merge_requests/:iid/notes`
    pub async fn create_merge_request_note(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        body: &str,
    ) -> Result<Value> {
        self.post(
            &[
                "projects",
                &project.to_string(),
                "merge_requests",
                &mr_iid.to_string(),
                "notes",
            ],
            &json!({ "body": body }),
        )
        .await
    }

    /// `PUT /projects/:id/merge_requests/:iid`
    pub async fn update_merge_request<B: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        fields: &B,
    ) -> Result<Value> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.put(
            &Self::merge_request_path(&project, &iid, &[]),
            &serde_json::to_value(fields)?,
        )
        .await
    }

    /// `POST /projects/:id/merge_requests/:iid/approve`
    ///
    /// With `sha`, GitLab refuses the approval if the source branch moved.
    pub async fn approve_merge_request(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        sha: Option<&str>,
    ) -> Result<Value> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        let body = match sha {
            Some(sha) => json!({ "sha": sha }),
            None => json!({}),
        };
        self.post(&Self::merge_request_path(&project, &iid, &["approve"]), &body)
            .await
    }

    /// `POST /projects/:id/merge_requests/:iid/unapprove`
    pub async fn unapprove_merge_request(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
    ) -> Result<Value> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.post(
            &Self::merge_request_path(&project, &iid, &["unapprove"]),
            &json!({}),
        )
        .await
    }

    /// `GET /projects/:id/merge_requests/:iid/notes`
    pub async fn list_merge_request_notes<Q: Serialize + ?Sized>(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        ordering: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.paginate(
            &Self::merge_request_path(&project, &iid, &["notes"]),
            ordering,
            pagination,
        )
        .await
    }

    /// `GET /projects/:id/merge_requests/:iid/discussions`
    pub async fn list_merge_request_discussions(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.paginate(
            &Self::merge_request_path(&project, &iid, &["discussions"]),
            NO_QUERY,
            pagination,
        )
        .await
    }

    /// `PUT /projects/:id/merge_requests/:iid/discussions/:discussion_id`
    pub async fn resolve_merge_request_discussion(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
        discussion_id: &str,
        resolved: bool,
    ) -> Result<Value> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.put(
            &Self::merge_request_path(&project, &iid, &["discussions", discussion_id]),
            &json!({ "resolved": resolved }),
        )
        .await
    }

    /// `GET /projects/:id/merge_requests/:iid/participants`
    pub async fn get_merge_request_participants(
        &self,
        project: &ProjectRef,
        mr_iid: u64,
    ) -> Result<Value> {
        let (project, iid) = (project.to_string(), mr_iid.to_string());
        self.get(
            &Self::merge_request_path(&project, &iid, &["participants"]),
            NO_QUERY,
        )
        .await
    }
}
