//! Redirect and rewrite middleware.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{
    BoxHandler, Handler, Middleware, RedirectMode, Request, RequestContext, Response, Result,
    StatusCode, Url,
};
use serde::{Deserialize, Serialize};

/// Rewrites the request after the target URL has been applied.
///
/// The context carries the intermediate request (already pointing at the
/// resolved target) alongside the event and route params.
pub type RequestTransform = Arc<dyn Fn(&RequestContext) -> Result<Request> + Send + Sync>;

/// Redirect/rewrite configuration.
#[derive(Clone)]
pub struct RedirectConfig {
    /// Target URL, absolute or relative to the incoming URL. Empty keeps it.
    pub url_or_path: String,
    /// Optional request rewrite applied after the target URL.
    pub transform: Option<RequestTransform>,
    /// Serve the target through the wrapped handler instead of redirecting.
    pub transparent: bool,
    /// Use `301` instead of `302` for non-transparent redirects.
    pub permanent: bool,
    /// Redirect mode attached to the request passed down.
    pub follow_mode: RedirectMode,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            url_or_path: String::new(),
            transform: None,
            transparent: true,
            permanent: false,
            follow_mode: RedirectMode::Follow,
        }
    }
}

impl RedirectConfig {
    /// Rewrite to `url_or_path` (transparent by default).
    pub fn to(url_or_path: impl Into<String>) -> Self {
        Self {
            url_or_path: url_or_path.into(),
            ..Default::default()
        }
    }

    /// Set the request transform.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Request> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Answer with an HTTP redirect when the URL changes.
    pub fn redirecting(mut self) -> Self {
        self.transparent = false;
        self
    }

    /// Make redirects permanent (`301`). Implies non-transparent.
    pub fn permanent(mut self) -> Self {
        self.transparent = false;
        self.permanent = true;
        self
    }

    /// Set the follow mode.
    pub fn with_follow_mode(mut self, mode: RedirectMode) -> Self {
        self.follow_mode = mode;
        self
    }

    fn status(&self) -> StatusCode {
        if self.permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        }
    }
}

impl std::fmt::Debug for RedirectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectConfig")
            .field("url_or_path", &self.url_or_path)
            .field("transform", &self.transform.is_some())
            .field("transparent", &self.transparent)
            .field("permanent", &self.permanent)
            .field("follow_mode", &self.follow_mode)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

/// Serializable redirect settings (transforms are code-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectSettings {
    #[serde(default)]
    pub url_or_path: String,
    #[serde(default = "default_true")]
    pub transparent: bool,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub follow_mode: RedirectMode,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            url_or_path: String::new(),
            transparent: true,
            permanent: false,
            follow_mode: RedirectMode::Follow,
        }
    }
}

impl From<RedirectSettings> for RedirectConfig {
    fn from(settings: RedirectSettings) -> Self {
        Self {
            url_or_path: settings.url_or_path,
            transform: None,
            transparent: settings.transparent,
            permanent: settings.permanent,
            follow_mode: settings.follow_mode,
        }
    }
}

/// `url` with its query pairs stably sorted by name.
pub fn sorted_query_url(url: &Url) -> Url {
    let mut sorted = url.clone();
    if url.query().is_none() {
        return sorted;
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        sorted.set_query(None);
    } else {
        sorted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    sorted
}

/// Points the request at another URL, either transparently or by
/// answering with a redirect.
#[derive(Debug, Clone, Default)]
pub struct RedirectMiddleware {
    config: Arc<RedirectConfig>,
}

impl RedirectMiddleware {
    /// Create the middleware.
    pub fn new(config: RedirectConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Middleware for RedirectMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RedirectHandler {
            config: Arc::clone(&self.config),
            next,
        })
    }

    fn name(&self) -> &'static str {
        "redirect"
    }
}

struct RedirectHandler {
    config: Arc<RedirectConfig>,
    next: BoxHandler,
}

#[async_trait]
impl Handler for RedirectHandler {
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        let config = &self.config;
        let original_url = sorted_query_url(ctx.request.url());

        let target = ctx.request.url().join(&config.url_or_path)?;
        let ctx = ctx.with_request(ctx.request.to_builder().url(target).build());

        let transformed = match &config.transform {
            Some(transform) => transform(&ctx)?,
            None => ctx.request.clone(),
        };
        let final_request = transformed.to_builder().redirect(config.follow_mode).build();
        let final_url = sorted_query_url(final_request.url());

        if !config.transparent && original_url != final_url {
            tracing::debug!(
                from = %original_url,
                to = %final_url,
                status = config.status().as_u16(),
                "redirecting"
            );
            return Response::redirect(final_url.as_str(), config.status());
        }

        self.next.handle(ctx.with_request(final_request)).await
    }
}
