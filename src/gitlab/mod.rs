//! GitLab REST API v4 client
//!
//! # Module Layout
//!
//! ```text
//! gitlab/
//! ├── mod.rs             -- this file; re-exports
//! ├── client.rs          -- GitLabClient, request/pagination/error mapping
//! ├── projects.rs        -- project endpoints
//! ├── issues.rs          -- issue and note endpoints
//! ├── merge_requests.rs  -- merge request endpoints
//! └── repository.rs      -- branch, tree, file and commit endpoints
//! ```

pub mod client;
mod issues;
mod merge_requests;
mod projects;
mod repository;

pub use client::{build_http_client, GitLabClient, Pagination, ProjectRef};
