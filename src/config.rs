//! Configuration management for Kepler MCP GitLab
//!
//! Values are layered with this precedence, highest first:
//!
//! 1. command line (`serve` options)
//! 2. `KEPLER_MCP_*` environment variables (a `.env` file is read first)
//! 3. YAML configuration file
//! 4. built-in defaults
//!
//! [`Config::validate`] runs after all layers are applied.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::cli::{ServeArgs, TransportArg};
use crate::error::{KeplerError, Result};
use crate::oauth::client_credentials::ClientCredentialsConfig;
use crate::oauth::flow::AuthorizationCodeConfig;
use crate::security::SecretString;
use crate::tools::ServerMetadata;

/// Prefix shared by every environment variable the server reads.
pub const ENV_PREFIX: &str = "KEPLER_MCP_";

/// Upper bound for every session duration setting (ten years).
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identity and transport
    #[serde(default)]
    pub server: ServerConfig,
    /// User and service OAuth
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Session lifetimes
    #[serde(default)]
    pub session: SessionConfig,
    /// Token persistence
    #[serde(default)]
    pub token_store: TokenStoreConfig,
    /// Outbound request limits
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// GitLab instance
    #[serde(default)]
    pub gitlab: GitLabConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Deployment environment. Anything other than `local` gets secure cookies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Developer machine
    #[default]
    Local,
    /// Shared development
    Dev,
    /// Staging
    Stage,
    /// Production
    Prod,
}

impl Environment {
    /// Lowercase name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = KeplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "dev" | "development" => Ok(Environment::Dev),
            "stage" | "staging" => Ok(Environment::Stage),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(KeplerError::Config(format!(
                "Invalid environment: {other}. Must be one of: local, dev, stage, prod"
            ))),
        }
    }
}

/// MCP transport
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC over HTTP
    Http,
}

impl Transport {
    /// Lowercase name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
        }
    }
}

impl FromStr for Transport {
    type Err = KeplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(KeplerError::Config(format!(
                "Invalid transport: {other}. Must be one of: stdio, http"
            ))),
        }
    }
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Transport::Stdio,
            TransportArg::Http => Transport::Http,
        }
    }
}

/// Server identity and transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name reported to MCP clients
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
    /// Bind address for the HTTP transport
    #[serde(default = "default_host")]
    pub host: String,
    /// Port for the HTTP transport
    #[serde(default = "default_port")]
    pub port: u16,
    /// Transport to serve on
    #[serde(default)]
    pub transport: Transport,
    /// Route for JSON-RPC over HTTP
    #[serde(default = "default_mcp_path")]
    pub mcp_path: String,
    /// Bearer token clients must present on the MCP route
    #[serde(default)]
    pub auth_token: Option<SecretString>,
}

fn default_app_name() -> String {
    "Kepler MCP GitLab".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: Environment::default(),
            host: default_host(),
            port: default_port(),
            transport: Transport::default(),
            mcp_path: default_mcp_path(),
            auth_token: None,
        }
    }
}

/// User (authorization code) and service (client credentials) OAuth
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Enables browser login with the authorization code flow
    #[serde(default)]
    pub user_auth_enabled: bool,
    /// Provider authorization endpoint
    #[serde(default)]
    pub authorization_url: Option<String>,
    /// Provider token endpoint
    #[serde(default)]
    pub token_url: Option<String>,
    /// Provider userinfo endpoint
    #[serde(default)]
    pub userinfo_url: Option<String>,
    /// Client id registered with the provider
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret for confidential clients
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    /// Callback URL registered with the provider
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Scopes requested at login
    #[serde(default)]
    pub scope: Option<String>,
    /// Enables the client credentials flow for a service account
    #[serde(default)]
    pub service_auth_enabled: bool,
    /// Service client id
    #[serde(default)]
    pub service_client_id: Option<String>,
    /// Service client secret
    #[serde(default)]
    pub service_client_secret: Option<SecretString>,
    /// Token endpoint for the service account
    #[serde(default)]
    pub service_token_url: Option<String>,
    /// Scopes requested for the service account
    #[serde(default)]
    pub service_scope: Option<String>,
}

/// Session and pending login lifetimes, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout of a login session
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,
    /// Tokens are refreshed this long before they expire
    #[serde(default = "default_refresh_buffer")]
    pub token_refresh_buffer_seconds: u64,
    /// How long a login may take between redirect and callback
    #[serde(default = "default_pending_state_timeout")]
    pub pending_state_timeout_seconds: u64,
    /// Interval of the expired session sweep
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_session_timeout() -> u64 {
    86_400
}

fn default_refresh_buffer() -> u64 {
    300
}

fn default_pending_state_timeout() -> u64 {
    600
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_session_timeout(),
            token_refresh_buffer_seconds: default_refresh_buffer(),
            pending_state_timeout_seconds: default_pending_state_timeout(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl SessionConfig {
    /// Session idle timeout, capped at [`MAX_DURATION_SECONDS`].
    pub fn timeout(&self) -> chrono::Duration {
        bounded_seconds(self.timeout_seconds)
    }

    /// Refresh window before token expiry, capped at [`MAX_DURATION_SECONDS`].
    pub fn refresh_buffer(&self) -> chrono::Duration {
        bounded_seconds(self.token_refresh_buffer_seconds)
    }

    /// Lifetime of a pending login state.
    pub fn pending_state_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.pending_state_timeout_seconds.min(MAX_DURATION_SECONDS))
    }

    /// Interval of the maintenance sweep. Never zero.
    pub fn cleanup_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.cleanup_interval_seconds.clamp(1, MAX_DURATION_SECONDS))
    }
}

/// Token persistence. Tokens stay in memory unless both fields are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStoreConfig {
    /// Encrypted token file
    #[serde(default)]
    pub path: Option<String>,
    /// Base64url AES-256 key, see `kepler-mcp-gitlab generate-key`
    #[serde(default)]
    pub encryption_key: Option<SecretString>,
}

/// Token bucket settings for outbound GitLab calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained rate
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_requests_per_minute() -> u32 {
    crate::rate_limit::DEFAULT_REQUESTS_PER_MINUTE
}

fn default_burst() -> u32 {
    crate::rate_limit::DEFAULT_BURST
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
        }
    }
}

/// GitLab instance and request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// Instance base URL
    #[serde(default = "default_gitlab_url")]
    pub url: String,
    /// Personal or project access token used when no OAuth identity applies
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Per-request timeout
    #[serde(default = "default_gitlab_timeout")]
    pub timeout_seconds: u64,
    /// Page size for list tools
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,
    /// Page cap for list tools
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_gitlab_timeout() -> u64 {
    30
}

fn default_per_page() -> u32 {
    crate::gitlab::client::DEFAULT_PER_PAGE
}

fn default_max_pages() -> u32 {
    crate::gitlab::client::DEFAULT_MAX_PAGES
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: default_gitlab_url(),
            token: None,
            timeout_seconds: default_gitlab_timeout(),
            default_per_page: default_per_page(),
            max_pages: default_max_pages(),
        }
    }
}

impl GitLabConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_seconds)
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `args` - `serve` options; `args.config` names the file
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Config`] if the file cannot be read or parsed.
    pub fn load(args: &ServeArgs) -> Result<Self> {
        load_dotenv();

        let mut config = match args.config.as_deref() {
            Some(path) if Path::new(path).exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!("Config file not found at {}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(args);

        Ok(config)
    }

    /// Parses a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Config`] on read or parse failure.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KeplerError::Config(format!("Failed to read config file: {e}")))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| KeplerError::Config(format!("Failed to parse config: {e}")))
    }

    fn apply_env_vars(&mut self) {
        // Server
        env_string("APP_NAME", &mut self.server.app_name);
        env_parsed("ENVIRONMENT", &mut self.server.environment);
        env_string("HOST", &mut self.server.host);
        env_parsed("PORT", &mut self.server.port);
        env_parsed("TRANSPORT", &mut self.server.transport);
        env_string("MCP_PATH", &mut self.server.mcp_path);
        env_secret("AUTH_TOKEN", &mut self.server.auth_token);

        // User OAuth
        env_parsed_bool("OAUTH_USER_AUTH_ENABLED", &mut self.oauth.user_auth_enabled);
        env_optional("OAUTH_AUTHORIZATION_URL", &mut self.oauth.authorization_url);
        env_optional("OAUTH_TOKEN_URL", &mut self.oauth.token_url);
        env_optional("OAUTH_USERINFO_URL", &mut self.oauth.userinfo_url);
        env_optional("OAUTH_CLIENT_ID", &mut self.oauth.client_id);
        env_secret("OAUTH_CLIENT_SECRET", &mut self.oauth.client_secret);
        env_optional("OAUTH_REDIRECT_URI", &mut self.oauth.redirect_uri);
        env_optional("OAUTH_SCOPE", &mut self.oauth.scope);

        // Service OAuth
        env_parsed_bool(
            "SERVICE_AUTH_ENABLED",
            &mut self.oauth.service_auth_enabled,
        );
        env_optional("SERVICE_CLIENT_ID", &mut self.oauth.service_client_id);
        env_secret(
            "SERVICE_CLIENT_SECRET",
            &mut self.oauth.service_client_secret,
        );
        env_optional("SERVICE_TOKEN_URL", &mut self.oauth.service_token_url);
        env_optional("SERVICE_SCOPE", &mut self.oauth.service_scope);

        // Sessions
        env_parsed("SESSION_TIMEOUT_SECONDS", &mut self.session.timeout_seconds);
        env_parsed(
            "TOKEN_REFRESH_BUFFER_SECONDS",
            &mut self.session.token_refresh_buffer_seconds,
        );
        env_parsed(
            "PENDING_STATE_TIMEOUT_SECONDS",
            &mut self.session.pending_state_timeout_seconds,
        );
        env_parsed(
            "SESSION_CLEANUP_INTERVAL_SECONDS",
            &mut self.session.cleanup_interval_seconds,
        );

        // Token store
        env_optional("TOKEN_STORE_PATH", &mut self.token_store.path);
        env_secret(
            "TOKEN_ENCRYPTION_KEY",
            &mut self.token_store.encryption_key,
        );

        // Rate limiting
        env_parsed(
            "RATE_LIMIT_REQUESTS_PER_MINUTE",
            &mut self.rate_limit.requests_per_minute,
        );
        env_parsed("RATE_LIMIT_BURST", &mut self.rate_limit.burst);

        // GitLab
        env_string("GITLAB_URL", &mut self.gitlab.url);
        env_secret("GITLAB_TOKEN", &mut self.gitlab.token);
        env_parsed("GITLAB_TIMEOUT_SECONDS", &mut self.gitlab.timeout_seconds);
        env_parsed("GITLAB_DEFAULT_PER_PAGE", &mut self.gitlab.default_per_page);
        env_parsed("GITLAB_MAX_PAGES", &mut self.gitlab.max_pages);

        // Logging
        env_string("LOG_LEVEL", &mut self.logging.level);
        env_parsed_bool("LOG_JSON", &mut self.logging.json);
    }

    fn apply_cli_overrides(&mut self, args: &ServeArgs) {
        if let Some(transport) = args.transport {
            self.server.transport = transport.into();
        }
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`KeplerError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(config_error("server.port must be greater than 0"));
        }

        if !self.server.mcp_path.starts_with('/') {
            return Err(config_error("server.mcp_path must start with '/'"));
        }

        if url::Url::parse(&self.gitlab.url).is_err() {
            return Err(KeplerError::Config(format!(
                "gitlab.url is not a valid URL: {}",
                self.gitlab.url
            )));
        }

        if self.gitlab.default_per_page == 0
            || self.gitlab.default_per_page > crate::gitlab::client::MAX_PER_PAGE
        {
            return Err(config_error(
                "gitlab.default_per_page must be between 1 and 100",
            ));
        }

        if self.gitlab.max_pages == 0 {
            return Err(config_error("gitlab.max_pages must be greater than 0"));
        }

        if self.rate_limit.requests_per_minute == 0 {
            return Err(config_error(
                "rate_limit.requests_per_minute must be greater than 0",
            ));
        }

        if self.rate_limit.burst == 0 {
            return Err(config_error("rate_limit.burst must be greater than 0"));
        }

        if self.session.timeout_seconds == 0 {
            return Err(config_error("session.timeout_seconds must be greater than 0"));
        }

        if self.session.cleanup_interval_seconds == 0 {
            return Err(config_error(
                "session.cleanup_interval_seconds must be greater than 0",
            ));
        }

        let durations = [
            ("session.timeout_seconds", self.session.timeout_seconds),
            (
                "session.token_refresh_buffer_seconds",
                self.session.token_refresh_buffer_seconds,
            ),
            (
                "session.pending_state_timeout_seconds",
                self.session.pending_state_timeout_seconds,
            ),
            (
                "session.cleanup_interval_seconds",
                self.session.cleanup_interval_seconds,
            ),
        ];
        for (name, value) in durations {
            if value > MAX_DURATION_SECONDS {
                return Err(KeplerError::Config(format!(
                    "{name} must be at most {MAX_DURATION_SECONDS}"
                )));
            }
        }

        if self.oauth.user_auth_enabled {
            let required = [
                ("oauth.authorization_url", &self.oauth.authorization_url),
                ("oauth.token_url", &self.oauth.token_url),
                ("oauth.client_id", &self.oauth.client_id),
                ("oauth.redirect_uri", &self.oauth.redirect_uri),
                ("oauth.scope", &self.oauth.scope),
            ];
            if let Some(missing) = first_missing(&required) {
                return Err(KeplerError::Config(format!(
                    "{missing} is required when oauth.user_auth_enabled is true"
                )));
            }
        }

        if self.oauth.service_auth_enabled {
            let required = [
                ("oauth.service_client_id", &self.oauth.service_client_id),
                ("oauth.service_token_url", &self.oauth.service_token_url),
            ];
            if let Some(missing) = first_missing(&required) {
                return Err(KeplerError::Config(format!(
                    "{missing} is required when oauth.service_auth_enabled is true"
                )));
            }
            if is_blank_secret(&self.oauth.service_client_secret) {
                return Err(config_error(
                    "oauth.service_client_secret is required when oauth.service_auth_enabled is true",
                ));
            }
        }

        if self.token_store.path.is_some() && is_blank_secret(&self.token_store.encryption_key) {
            return Err(config_error(
                "token_store.encryption_key is required when token_store.path is set",
            ));
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived settings
    // -----------------------------------------------------------------------

    /// Authorization code flow settings, when user auth is enabled.
    pub fn authorization_code_config(&self) -> Option<AuthorizationCodeConfig> {
        if !self.oauth.user_auth_enabled {
            return None;
        }
        Some(AuthorizationCodeConfig {
            authorization_url: self.oauth.authorization_url.clone()?,
            token_url: self.oauth.token_url.clone()?,
            userinfo_url: self.oauth.userinfo_url.clone(),
            client_id: self.oauth.client_id.clone()?,
            client_secret: self.oauth.client_secret.clone(),
            redirect_uri: self.oauth.redirect_uri.clone()?,
            scope: self.oauth.scope.clone()?,
            refresh_buffer: self.session.refresh_buffer(),
        })
    }

    /// Client credentials settings, when service auth is enabled.
    pub fn client_credentials_config(&self) -> Option<ClientCredentialsConfig> {
        if !self.oauth.service_auth_enabled {
            return None;
        }
        Some(ClientCredentialsConfig {
            token_url: self.oauth.service_token_url.clone()?,
            client_id: self.oauth.service_client_id.clone()?,
            client_secret: self.oauth.service_client_secret.clone()?,
            scope: self.oauth.service_scope.clone(),
        })
    }

    /// Facts reported by the server tools.
    pub fn server_metadata(&self) -> ServerMetadata {
        ServerMetadata {
            app_name: self.server.app_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.server.environment.as_str().to_string(),
            transport: self.server.transport.as_str().to_string(),
            gitlab_url: self.gitlab.url.clone(),
            user_auth_enabled: self.oauth.user_auth_enabled,
            service_auth_enabled: self.oauth.service_auth_enabled,
            rate_limit_requests_per_minute: self.rate_limit.requests_per_minute,
            rate_limit_burst: self.rate_limit.burst,
            default_per_page: self.gitlab.default_per_page,
            max_pages: self.gitlab.max_pages,
            started_at: std::time::Instant::now(),
        }
    }

    /// Cookies carry `Secure` everywhere except local development.
    pub fn secure_cookies(&self) -> bool {
        self.server.environment != Environment::Local
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_error(message: &str) -> KeplerError {
    KeplerError::Config(message.to_string())
}

fn bounded_seconds(seconds: u64) -> chrono::Duration {
    // MAX_DURATION_SECONDS fits comfortably in chrono's range.
    chrono::Duration::seconds(seconds.min(MAX_DURATION_SECONDS) as i64)
}

fn first_missing<'a>(fields: &[(&'a str, &Option<String>)]) -> Option<&'a str> {
    fields
        .iter()
        .find(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
}

fn is_blank_secret(secret: &Option<SecretString>) -> bool {
    secret.as_ref().map_or(true, SecretString::is_empty)
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }
}

fn env_var(suffix: &str) -> Option<(String, String)> {
    let name = format!("{ENV_PREFIX}{suffix}");
    std::env::var(&name).ok().map(|value| (name, value))
}

fn env_string(suffix: &str, target: &mut String) {
    if let Some((_, value)) = env_var(suffix) {
        *target = value;
    }
}

fn env_optional(suffix: &str, target: &mut Option<String>) {
    if let Some((_, value)) = env_var(suffix) {
        *target = Some(value);
    }
}

fn env_secret(suffix: &str, target: &mut Option<SecretString>) {
    if let Some((_, value)) = env_var(suffix) {
        *target = Some(SecretString::new(value));
    }
}

fn env_parsed<T: FromStr>(suffix: &str, target: &mut T) {
    if let Some((name, value)) = env_var(suffix) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Invalid {}: {}, keeping current value", name, value),
        }
    }
}

fn env_parsed_bool(suffix: &str, target: &mut bool) {
    if let Some((name, value)) = env_var(suffix) {
        match parse_bool(&value) {
            Some(parsed) => *target = parsed,
            None => tracing::warn!("Invalid {}: {}, keeping current value", name, value),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
