//! CORS response headers and middleware.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{
    append_vary, names, BoxHandler, Handler, Middleware, RequestContext, Response, Result,
};
use serde::{Deserialize, Serialize};

use crate::allowlist::OriginAllowlist;

/// CORS header names.
pub mod cors_headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
}

/// Wildcard origin.
pub const ANY_ORIGIN: &str = "*";

type OriginPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Decides whether an origin receives CORS headers.
#[derive(Clone)]
pub enum OriginCheck {
    /// Rule-based allowlist.
    Allowlist(OriginAllowlist),
    /// Arbitrary predicate.
    Predicate(OriginPredicate),
}

impl OriginCheck {
    /// Wrap a predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Whether `origin` is accepted.
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Allowlist(list) => list.is_allowed(origin),
            Self::Predicate(f) => f(origin),
        }
    }
}

impl From<OriginAllowlist> for OriginCheck {
    fn from(list: OriginAllowlist) -> Self {
        Self::Allowlist(list)
    }
}

impl std::fmt::Debug for OriginCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowlist(list) => f.debug_tuple("Allowlist").field(list).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Origin filter; `None` accepts every origin.
    pub is_origin_allowed: Option<OriginCheck>,
    /// `Access-Control-Allow-Headers` values.
    pub allow_headers: Vec<String>,
    /// `Access-Control-Allow-Methods` values.
    pub allow_methods: Vec<String>,
    /// `Access-Control-Max-Age` in seconds.
    pub max_age: u32,
    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
    /// `Access-Control-Expose-Headers` values; omitted when empty.
    pub expose_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            is_origin_allowed: None,
            allow_headers: default_allow_headers(),
            allow_methods: default_allow_methods(),
            max_age: default_max_age(),
            allow_credentials: false,
            expose_headers: Vec::new(),
        }
    }
}

impl CorsConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only answer origins accepted by `check`.
    pub fn with_origin_check(mut self, check: impl Into<OriginCheck>) -> Self {
        self.is_origin_allowed = Some(check.into());
        self
    }

    /// Only answer origins accepted by `f`.
    pub fn with_origin_predicate<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.with_origin_check(OriginCheck::predicate(f))
    }

    /// Set the allowed request headers.
    pub fn with_allow_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.allow_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the allowed methods.
    pub fn with_allow_methods<S: Into<String>>(mut self, methods: impl IntoIterator<Item = S>) -> Self {
        self.allow_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Set the preflight max age in seconds.
    pub fn with_max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    /// Allow credentials.
    pub fn with_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Set the headers exposed to scripts.
    pub fn with_expose_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }
}

fn default_allow_headers() -> Vec<String> {
    ["Origin", "Content-Type", "Accept", "Authorization"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_allow_methods() -> Vec<String> {
    ["GET", "OPTIONS", "HEAD"].iter().map(|s| s.to_string()).collect()
}

fn default_max_age() -> u32 {
    3600
}

/// Serializable CORS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsSettings {
    /// Origin allowlist entries (see [`OriginAllowlist::from_entries`]);
    /// empty accepts every origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,
    #[serde(default = "default_max_age")]
    pub max_age: u32,
    #[serde(default)]
    pub allow_credentials: bool,
    #[serde(default)]
    pub expose_headers: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_headers: default_allow_headers(),
            allow_methods: default_allow_methods(),
            max_age: default_max_age(),
            allow_credentials: false,
            expose_headers: Vec::new(),
        }
    }
}

impl TryFrom<CorsSettings> for CorsConfig {
    type Error = crate::allowlist::AllowlistError;

    fn try_from(settings: CorsSettings) -> std::result::Result<Self, Self::Error> {
        let is_origin_allowed = if settings.allowed_origins.is_empty() {
            None
        } else {
            Some(OriginCheck::Allowlist(OriginAllowlist::from_entries(
                &settings.allowed_origins,
            )?))
        };
        Ok(Self {
            is_origin_allowed,
            allow_headers: settings.allow_headers,
            allow_methods: settings.allow_methods,
            max_age: settings.max_age,
            allow_credentials: settings.allow_credentials,
            expose_headers: settings.expose_headers,
        })
    }
}

/// Stamp CORS headers for `origin` (default `*`) onto a copy of `response`.
///
/// An origin rejected by the configured check gets the response back
/// unchanged, without any `Access-Control-*` header. A non-wildcard origin
/// adds `Origin` to `Vary` once.
pub fn apply_cors(response: &Response, origin: Option<&str>, config: &CorsConfig) -> Result<Response> {
    let origin = origin.unwrap_or(ANY_ORIGIN);

    if let Some(check) = &config.is_origin_allowed {
        if !check.allows(origin) {
            tracing::debug!(origin, "cors origin rejected");
            return Ok(response.clone());
        }
    }

    let mut headers = response
        .headers()
        .set(cors_headers::ALLOW_ORIGIN, origin)?
        .set(cors_headers::ALLOW_HEADERS, &config.allow_headers.join(", "))?
        .set(cors_headers::ALLOW_METHODS, &config.allow_methods.join(", "))?
        .set(cors_headers::MAX_AGE, &config.max_age.to_string())?;

    if config.allow_credentials {
        headers = headers.set(cors_headers::ALLOW_CREDENTIALS, "true")?;
    }

    if !config.expose_headers.is_empty() {
        headers = headers.set(cors_headers::EXPOSE_HEADERS, &config.expose_headers.join(", "))?;
    }

    if origin != ANY_ORIGIN {
        headers = append_vary(&headers, "Origin")?;
    }

    Ok(response.with_headers(headers))
}

/// Adds CORS headers to responses for requests carrying an `Origin` header.
#[derive(Debug, Clone, Default)]
pub struct CorsMiddleware {
    config: Arc<CorsConfig>,
}

impl CorsMiddleware {
    /// Create the middleware.
    pub fn new(config: CorsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Middleware for CorsMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(CorsHandler {
            config: Arc::clone(&self.config),
            next,
        })
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}

struct CorsHandler {
    config: Arc<CorsConfig>,
    next: BoxHandler,
}

#[async_trait]
impl Handler for CorsHandler {
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        let origin = ctx.request.header(names::ORIGIN);
        let response = self.next.handle(ctx).await?;
        match origin {
            Some(origin) => apply_cors(&response, Some(&origin), &self.config),
            None => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{handler_fn, Headers, Request, StatusCode};

    fn ctx(origin: Option<&str>) -> RequestContext {
        let mut builder = Request::get("https://example.com/api").unwrap().to_builder();
        if let Some(origin) = origin {
            builder = builder.header("Origin", origin).unwrap();
        }
        RequestContext::from_request(builder.build())
    }

    fn ok_handler() -> BoxHandler {
        handler_fn(|_ctx| async { Ok(Response::ok("ok")) })
    }

    fn has_any_cors_header(response: &Response) -> bool {
        response
            .headers()
            .names()
            .iter()
            .any(|name| name.starts_with("access-control-"))
    }

    // === apply_cors Tests ===

    #[test]
    fn test_defaults_with_wildcard() {
        let response = apply_cors(&Response::ok("ok"), None, &CorsConfig::default()).unwrap();

        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*".to_string()));
        assert_eq!(
            response.header("Access-Control-Allow-Headers"),
            Some("Origin, Content-Type, Accept, Authorization".to_string())
        );
        assert_eq!(
            response.header("Access-Control-Allow-Methods"),
            Some("GET, OPTIONS, HEAD".to_string())
        );
        assert_eq!(response.header("Access-Control-Max-Age"), Some("3600".to_string()));
        assert_eq!(response.header("Access-Control-Allow-Credentials"), None);
        assert_eq!(response.header("Access-Control-Expose-Headers"), None);
        assert_eq!(response.header("Vary"), None);
    }

    #[test]
    fn test_custom_configuration() {
        let config = CorsConfig::new()
            .with_allow_headers(["X-Custom"])
            .with_allow_methods(["GET", "POST"])
            .with_max_age(60)
            .with_credentials(true)
            .with_expose_headers(["X-Total-Count", "X-Page"]);

        let response = apply_cors(&Response::ok("ok"), Some("https://app.test"), &config).unwrap();

        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("https://app.test".to_string()));
        assert_eq!(response.header("Access-Control-Allow-Headers"), Some("X-Custom".to_string()));
        assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET, POST".to_string()));
        assert_eq!(response.header("Access-Control-Max-Age"), Some("60".to_string()));
        assert_eq!(response.header("Access-Control-Allow-Credentials"), Some("true".to_string()));
        assert_eq!(
            response.header("Access-Control-Expose-Headers"),
            Some("X-Total-Count, X-Page".to_string())
        );
    }

    #[test]
    fn test_rejected_origin_gets_no_cors_headers() {
        let config = CorsConfig::new().with_origin_predicate(|origin| origin == "https://good.test");
        let original = Response::new(
            StatusCode::OK,
            Headers::from_pairs([("X-Foo", "foo")]).unwrap(),
            "ok",
        );

        let response = apply_cors(&original, Some("https://evil.test"), &config).unwrap();

        assert!(!has_any_cors_header(&response));
        assert_eq!(response, original);
    }

    #[test]
    fn test_vary_origin_added_once() {
        let config = CorsConfig::default();
        let once = apply_cors(&Response::ok("ok"), Some("https://app.test"), &config).unwrap();
        let twice = apply_cors(&once, Some("https://app.test"), &config).unwrap();

        assert_eq!(twice.headers().get_all("Vary"), vec!["Origin"]);
    }

    #[test]
    fn test_allowlist_as_origin_check() {
        let config = CorsConfig::new()
            .with_origin_check(OriginAllowlist::new().allow_pattern("https://*.example.com"));

        let allowed = apply_cors(&Response::ok(""), Some("https://app.example.com"), &config).unwrap();
        let denied = apply_cors(&Response::ok(""), Some("https://example.net"), &config).unwrap();

        assert!(has_any_cors_header(&allowed));
        assert!(!has_any_cors_header(&denied));
    }

    // === Middleware Tests ===

    #[tokio::test]
    async fn test_middleware_without_origin_is_bypassed() {
        let handler = CorsMiddleware::default().wrap(ok_handler());
        let response = handler.handle(ctx(None)).await.unwrap();

        assert!(!has_any_cors_header(&response));
        assert_eq!(response.header("Vary"), None);
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_middleware_echoes_request_origin() {
        let handler = CorsMiddleware::default().wrap(ok_handler());
        let response = handler.handle(ctx(Some("https://app.test"))).await.unwrap();

        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("https://app.test".to_string()));
        assert_eq!(response.header("Vary"), Some("Origin".to_string()));
    }

    #[tokio::test]
    async fn test_middleware_rejects_disallowed_origin() {
        let config = CorsConfig::new().with_origin_predicate(|_| false);
        let handler = CorsMiddleware::new(config).wrap(ok_handler());
        let response = handler.handle(ctx(Some("https://app.test"))).await.unwrap();

        assert!(!has_any_cors_header(&response));
        assert_eq!(response.text(), "ok");
    }

    // === Settings Tests ===

    #[test]
    fn test_settings_into_config() {
        let settings: CorsSettings = serde_json::from_str(
            r#"{"allowed_origins": ["https://*.example.com"], "allow_credentials": true}"#,
        )
        .unwrap();
        let config = CorsConfig::try_from(settings).unwrap();

        assert_eq!(config.max_age, 3600);
        assert!(config.allow_credentials);
        assert!(config.is_origin_allowed.as_ref().is_some_and(|c| c.allows("https://a.example.com")));
        assert!(CorsConfig::try_from(CorsSettings::default()).unwrap().is_origin_allowed.is_none());
    }
}
