//! Shared helpers for integration tests

use std::fs;
use std::path::PathBuf;

use chrono::Duration;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kepler_mcp_gitlab::config::{Config, OAuthConfig};
use kepler_mcp_gitlab::oauth::flow::AuthorizationCodeConfig;
use kepler_mcp_gitlab::security::SecretString;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Authorization code settings whose endpoints live on `idp_uri`.
#[allow(dead_code)]
pub fn auth_code_config(idp_uri: &str) -> AuthorizationCodeConfig {
    AuthorizationCodeConfig {
        authorization_url: format!("{idp_uri}/oauth/authorize"),
        token_url: format!("{idp_uri}/oauth/token"),
        userinfo_url: Some(format!("{idp_uri}/oauth/userinfo")),
        client_id: "kepler-client".to_string(),
        client_secret: Some(SecretString::new("kepler-secret")),
        redirect_uri: "http://localhost:8000/oauth/callback".to_string(),
        scope: "api read_user".to_string(),
        refresh_buffer: Duration::minutes(5),
    }
}

/// Configuration that calls GitLab at `gitlab_uri` with a static token.
#[allow(dead_code)]
pub fn static_token_config(gitlab_uri: &str) -> Config {
    let mut config = Config::default();
    config.gitlab.url = gitlab_uri.to_string();
    config.gitlab.token = Some(SecretString::new("glpat-test"));
    config
}

/// Configuration with user OAuth against `idp_uri` and GitLab at `gitlab_uri`.
#[allow(dead_code)]
pub fn user_auth_config(idp_uri: &str, gitlab_uri: &str) -> Config {
    let mut config = Config::default();
    config.gitlab.url = gitlab_uri.to_string();
    config.oauth = OAuthConfig {
        user_auth_enabled: true,
        authorization_url: Some(format!("{idp_uri}/oauth/authorize")),
        token_url: Some(format!("{idp_uri}/oauth/token")),
        userinfo_url: Some(format!("{idp_uri}/oauth/userinfo")),
        client_id: Some("kepler-client".to_string()),
        client_secret: Some(SecretString::new("kepler-secret")),
        redirect_uri: Some("http://localhost:8000/oauth/callback".to_string()),
        scope: Some("api".to_string()),
        ..OAuthConfig::default()
    };
    config
}

/// Mounts a token endpoint that issues `access_token` with a one hour life.
#[allow(dead_code)]
pub async fn mount_token_endpoint(server: &MockServer, access_token: &str, refresh_token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "refresh_token": refresh_token,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}
