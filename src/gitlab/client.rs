//! Authenticated HTTP client for the GitLab REST API v4
//!
//! Every request is gated by the shared [`RateLimiter`], carries headers from
//! the request's [`AuthStrategy`], and maps error statuses to [`GitLabError`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::auth::AuthStrategy;
use crate::error::{GitLabError, KeplerError, Result};
use crate::rate_limit::RateLimiter;

/// Default request timeout for GitLab calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// GitLab rejects larger page sizes.
pub const MAX_PER_PAGE: u32 = 100;

/// Default page size for list endpoints.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Default cap on pages fetched by one list call.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Empty query string.
pub const NO_QUERY: &[(&str, &str)] = &[];

// ---------------------------------------------------------------------------
// ProjectRef
// ---------------------------------------------------------------------------

/// A project addressed by numeric id or by `namespace/path`.
///
/// # Examples
///
/// ```
/// use kepler_mcp_gitlab::gitlab::ProjectRef;
///
/// let by_path: ProjectRef = serde_json::from_value(serde_json::json!("group/app")).unwrap();
/// assert_eq!(by_path.to_string(), "group/app");
///
/// let by_id: ProjectRef = serde_json::from_value(serde_json::json!(42)).unwrap();
/// assert_eq!(by_id.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    /// Numeric project id
    Id(u64),
    /// Full path such as `group/subgroup/project`
    Path(String),
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectRef::Id(id) => write!(f, "{id}"),
            ProjectRef::Path(path) => f.write_str(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page selection for list endpoints.
///
/// With `page` set only that page is fetched; otherwise pages are fetched from
/// 1 until a short page or `max_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Items per page, capped at [`MAX_PER_PAGE`].
    pub per_page: u32,
    /// A single page to fetch.
    pub page: Option<u32>,
    /// Upper bound on pages fetched.
    pub max_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            page: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Pagination {
    fn effective_per_page(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

// ---------------------------------------------------------------------------
// GitLabClient
// ---------------------------------------------------------------------------

/// GitLab REST client bound to one authentication strategy.
///
/// Cheap to clone; clones share the connection pool and rate limiter.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    api_url: Url,
    http: reqwest::Client,
    auth: AuthStrategy,
    rate_limiter: Option<Arc<RateLimiter>>,
    rate_limit_max_wait: Duration,
}

/// Builds the shared HTTP client used for GitLab requests.
///
/// # Errors
///
/// Returns [`KeplerError::Http`] if the TLS backend fails to initialise.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

impl GitLabClient {
    /// Creates a client for the GitLab instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Config`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, http: reqwest::Client, auth: AuthStrategy) -> Result<Self> {
        let mut api_url = Url::parse(base_url)
            .map_err(|e| KeplerError::Config(format!("invalid GitLab URL '{base_url}': {e}")))?;
        api_url
            .path_segments_mut()
            .map_err(|_| KeplerError::Config(format!("GitLab URL '{base_url}' cannot be a base")))?
            .pop_if_empty()
            .extend(["api", "v4"]);

        Ok(Self {
            api_url,
            http,
            auth,
            rate_limiter: None,
            rate_limit_max_wait: DEFAULT_TIMEOUT,
        })
    }

    /// Gates every request through `limiter`, waiting at most `max_wait`.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>, max_wait: Duration) -> Self {
        self.rate_limiter = Some(limiter);
        self.rate_limit_max_wait = max_wait;
        self
    }

    /// Copy of this client that authenticates with `auth`.
    ///
    /// The copy shares the connection pool and rate limiter.
    pub fn with_auth(&self, auth: AuthStrategy) -> Self {
        Self {
            auth,
            ..self.clone()
        }
    }

    /// Base API URL, e.g. `https://gitlab.com/api/v4`.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Strategy used for outbound authentication.
    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    /// Sends a request and returns the decoded JSON body.
    ///
    /// `segments` are appended to the API URL one path segment each, so a
    /// segment such as `group/app` is sent as `group%2Fapp`. A 204 response or
    /// an empty body yields `None`.
    ///
    /// # Errors
    ///
    /// - [`KeplerError::RateLimited`] when the local limiter budget is exceeded
    /// - [`KeplerError::Session`] / [`KeplerError::OAuth`] from authentication
    /// - [`KeplerError::GitLab`] for error statuses
    /// - [`KeplerError::Http`] for transport failures
    pub async fn request<Q: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &Q,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        self.send(method, segments, query, &[], body).await
    }

    /// `GET` returning `Value::Null` for empty bodies.
    pub async fn get<Q: Serialize + ?Sized>(&self, segments: &[&str], query: &Q) -> Result<Value> {
        Ok(self
            .request(Method::GET, segments, query, None)
            .await?
            .unwrap_or(Value::Null))
    }

    /// `POST` with a JSON body.
    pub async fn post(&self, segments: &[&str], body: &Value) -> Result<Value> {
        Ok(self
            .request(Method::POST, segments, NO_QUERY, Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    /// `PUT` with a JSON body.
    pub async fn put(&self, segments: &[&str], body: &Value) -> Result<Value> {
        Ok(self
            .request(Method::PUT, segments, NO_QUERY, Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    /// `DELETE`, returning the body if GitLab sent one.
    pub async fn delete(&self, segments: &[&str]) -> Result<Option<Value>> {
        self.request(Method::DELETE, segments, NO_QUERY, None).await
    }

    /// Collects items from a paginated list endpoint.
    ///
    /// A non-array response is returned as a single item.
    pub async fn paginate<Q: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        query: &Q,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let per_page = pagination.effective_per_page();
        let pages = match pagination.page {
            Some(page) => page.max(1)..=page.max(1),
            None => 1..=pagination.max_pages.max(1),
        };

        let mut items = Vec::new();
        for page in pages {
            let page_query = [("per_page", per_page.to_string()), ("page", page.to_string())];
            match self
                .send(Method::GET, segments, query, &page_query, None)
                .await?
            {
                Some(Value::Array(batch)) => {
                    let short = batch.len() < per_page as usize;
                    items.extend(batch);
                    if short {
                        break;
                    }
                }
                Some(other) => {
                    items.push(other);
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }

    /// The authenticated user's profile.
    pub async fn current_user(&self) -> Result<Value> {
        self.get(&["user"], NO_QUERY).await
    }

    async fn send<Q: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &Q,
        page_query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        if let Some(limiter) = &self.rate_limiter {
            limiter
                .acquire_within(&self.auth.rate_limit_key(), self.rate_limit_max_wait)
                .await?;
        }

        let url = self.endpoint(segments)?;
        let headers = self.auth.auth_headers().await?;

        tracing::debug!(method = %method, path = url.path(), "GitLab request");

        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .query(query)
            .query(page_query);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !status.is_success() {
            let retry_after = parse_retry_after(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            let error = GitLabError::from_status(
                status.as_u16(),
                extract_error_message(status, &text),
                retry_after,
            );
            tracing::debug!(status = status.as_u16(), error = %error, "GitLab request failed");
            return Err(error.into());
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| KeplerError::Config("GitLab URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(url)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}

/// Picks a message from GitLab's error body: `message`, then `error`, then
/// the raw text, then the status reason.
fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            match json.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GitLabClient {
        GitLabClient::new(base, reqwest::Client::new(), AuthStrategy::None).unwrap()
    }

    #[test]
    fn test_api_url_appends_version() {
        assert_eq!(
            client("https://gitlab.com").api_url().as_str(),
            "https://gitlab.com/api/v4"
        );
        assert_eq!(
            client("https://example.com/gitlab/").api_url().as_str(),
            "https://example.com/gitlab/api/v4"
        );
    }

    #[test]
    fn test_endpoint_encodes_project_path_as_one_segment() {
        let url = client("https://gitlab.com")
            .endpoint(&["projects", "group/sub project", "issues"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.com/api/v4/projects/group%2Fsub%20project/issues"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        assert!(matches!(
            GitLabClient::new("not a url", reqwest::Client::new(), AuthStrategy::None),
            Err(KeplerError::Config(_))
        ));
    }

    #[test]
    fn test_extract_error_message_prefers_message_then_error() {
        assert_eq!(
            extract_error_message(StatusCode::NOT_FOUND, r#"{"message":"404 Project Not Found"}"#),
            "404 Project Not Found"
        );
        assert_eq!(
            extract_error_message(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_token"}"#),
            "invalid_token"
        );
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, r#"{"message":{"title":["is missing"]}}"#),
            r#"{"title":["is missing"]}"#
        );
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(extract_error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }

    #[test]
    fn test_pagination_caps_per_page() {
        let pagination = Pagination {
            per_page: 500,
            ..Pagination::default()
        };
        assert_eq!(pagination.effective_per_page(), 100);
    }
}
