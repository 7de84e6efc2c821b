//! Project endpoints

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::gitlab::client::{GitLabClient, Pagination, ProjectRef, NO_QUERY};

impl GitLabClient {
    /// `GET /projects` with filters such as `search`, `owned`, `membership`.
    pub async fn list_projects<Q: Serialize + ?Sized>(
        &self,
        filters: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.paginate(&["projects"], filters, pagination).await
    }

    /// `GET /projects/:id`
    pub async fn get_project(&self, project: &ProjectRef) -> Result<Value> {
        self.get(&["projects", &project.to_string()], NO_QUERY)
            .await
    }

    /// `GET /projects/:id/languages`
    pub async fn get_project_languages(&self, project: &ProjectRef) -> Result<Value> {
        self.get(&["projects", &project.to_string(), "languages"], NO_QUERY)
            .await
    }
}
