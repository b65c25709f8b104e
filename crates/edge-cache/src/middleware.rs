//! Cache middleware.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use edge_core::{
    append_vary, names, BoxHandler, EdgeError, Handler, Headers, Method, Middleware, RedirectMode,
    Request, RequestContext, Response, Result,
};
use serde::{Deserialize, Serialize};

use crate::memory::CacheStorage;
use crate::store::{CacheStore, MatchOptions};
use crate::timing::{server_timing_entry, CacheStatus};

/// Value forced onto error responses that must not be stored.
pub const NO_STORE: &str = "no-store";

/// Whether a request may be served from or stored in the cache.
pub fn is_cacheable(request: &Request) -> bool {
    request.method() == Method::GET && matches!(request.url().scheme(), "http" | "https")
}

/// Cache middleware configuration.
#[derive(Clone)]
pub struct CacheConfig {
    /// Store used for lookups and writes.
    pub store: Arc<dyn CacheStore>,
    /// `Cache-Control` value forced onto cacheable responses.
    pub cache_control: Option<String>,
    /// Edge cache duration (seconds) attached to the request passed down.
    pub cdn_ttl: Option<u32>,
    /// Allow responses with status >= 400 to be stored.
    pub cache_error: bool,
    /// Request headers appended to `Vary` on stored responses.
    pub vary_headers: Vec<String>,
    /// Append a `Server-Timing` metric with hit/miss and elapsed time.
    pub server_timings: bool,
}

impl CacheConfig {
    /// Defaults around an injected store.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            cache_control: None,
            cdn_ttl: None,
            cache_error: false,
            vary_headers: Vec::new(),
            server_timings: true,
        }
    }

    /// Force a `Cache-Control` value.
    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    /// Set the edge cache duration in seconds.
    pub fn with_cdn_ttl(mut self, seconds: u32) -> Self {
        self.cdn_ttl = Some(seconds);
        self
    }

    /// Allow error responses to be stored.
    pub fn with_cache_error(mut self, cache_error: bool) -> Self {
        self.cache_error = cache_error;
        self
    }

    /// Add a request header to `Vary` on stored responses.
    pub fn vary_on(mut self, header: impl Into<String>) -> Self {
        self.vary_headers.push(header.into());
        self
    }

    /// Enable or disable the `Server-Timing` metric.
    pub fn with_server_timings(mut self, enabled: bool) -> Self {
        self.server_timings = enabled;
        self
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("cache_control", &self.cache_control)
            .field("cdn_ttl", &self.cdn_ttl)
            .field("cache_error", &self.cache_error)
            .field("vary_headers", &self.vary_headers)
            .field("server_timings", &self.server_timings)
            .finish_non_exhaustive()
    }
}

fn default_cache_name() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Serializable cache settings naming the cache to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Name of the cache opened from the injected storage.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    /// `Cache-Control` value forced onto cacheable responses.
    #[serde(default)]
    pub cache_control: Option<String>,
    /// Edge cache duration in seconds.
    #[serde(default)]
    pub cdn_ttl: Option<u32>,
    /// Allow error responses to be stored.
    #[serde(default)]
    pub cache_error: bool,
    /// Request headers appended to `Vary` on stored responses.
    #[serde(default)]
    pub vary_headers: Vec<String>,
    /// Append a `Server-Timing` metric.
    #[serde(default = "default_true")]
    pub server_timings: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            cache_control: None,
            cdn_ttl: None,
            cache_error: false,
            vary_headers: Vec::new(),
            server_timings: true,
        }
    }
}

impl CacheSettings {
    /// Resolve the settings against `storage`.
    pub fn into_config(self, storage: &CacheStorage) -> CacheConfig {
        let store: Arc<dyn CacheStore> = storage.open(&self.cache_name);
        CacheConfig {
            store,
            cache_control: self.cache_control,
            cdn_ttl: self.cdn_ttl,
            cache_error: self.cache_error,
            vary_headers: self.vary_headers,
            server_timings: self.server_timings,
        }
    }
}

/// Serves cacheable requests from the store and populates it on misses.
///
/// The cache key is always the event's original request, even when this
/// layer (through `cdn_ttl`) or an outer one passes a rebuilt request
/// down. Store writes are registered on the event and run when the host
/// settles its pending tasks; they never delay the response.
#[derive(Debug, Clone)]
pub struct CacheMiddleware {
    config: Arc<CacheConfig>,
}

impl CacheMiddleware {
    /// Create the middleware.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Middleware for CacheMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(CacheHandler {
            config: Arc::clone(&self.config),
            next,
        })
    }

    fn name(&self) -> &'static str {
        "cache"
    }
}

struct CacheHandler {
    config: Arc<CacheConfig>,
    next: BoxHandler,
}

impl CacheHandler {
    /// Apply timing and cacheability headers to the outgoing response.
    fn finalize(&self, response: &Response, status: CacheStatus, started: Instant) -> Result<(Headers, bool)> {
        let config = &self.config;
        let mut headers = response.headers().clone();

        if config.server_timings {
            let entry = server_timing_entry(status, started.elapsed());
            headers = headers.append(names::SERVER_TIMING, &entry)?;
        }

        if response.is_error() && !config.cache_error {
            headers = headers.set(names::CACHE_CONTROL, NO_STORE)?;
        } else if let Some(cache_control) = &config.cache_control {
            headers = headers.set(names::CACHE_CONTROL, cache_control)?;
        }

        let should_put = status == CacheStatus::Miss
            && headers
                .get(names::CACHE_CONTROL)
                .is_some_and(|value| value != NO_STORE);

        if should_put {
            for vary in &config.vary_headers {
                headers = append_vary(&headers, vary)?;
            }
        }

        Ok((headers, should_put))
    }
}

#[async_trait]
impl Handler for CacheHandler {
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        if !is_cacheable(&ctx.request) {
            tracing::debug!(
                method = %ctx.request.method(),
                url = %ctx.request.url(),
                "cache bypass"
            );
            return self.next.handle(ctx).await;
        }

        let ctx = match self.config.cdn_ttl {
            Some(ttl) => {
                let request = ctx
                    .request
                    .to_builder()
                    .edge_cache_ttl(ttl)
                    .redirect(RedirectMode::Follow)
                    .build();
                ctx.with_request(request)
            }
            None => ctx,
        };

        let event = Arc::clone(&ctx.event);
        let key = event.request().clone();

        let started = Instant::now();
        let (response, status) = match self
            .config
            .store
            .match_request(&key, MatchOptions::default())
            .await
            .map_err(EdgeError::from)?
        {
            Some(cached) => (cached, CacheStatus::Hit),
            None => (self.next.handle(ctx).await?, CacheStatus::Miss),
        };

        let (headers, should_put) = self.finalize(&response, status, started)?;
        let response = response.with_headers(headers);

        tracing::debug!(
            url = %key.url(),
            status = %status,
            response_status = response.status().as_u16(),
            store = should_put,
            "cache lookup"
        );

        if should_put {
            // The entry lives for the edge TTL when no max-age applies.
            let key = match self.config.cdn_ttl {
                Some(ttl) => key.to_builder().edge_cache_ttl(ttl).build(),
                None => key,
            };
            let store = Arc::clone(&self.config.store);
            let stored = response.clone();
            event.wait_until(async move {
                store.put(&key, stored).await.map_err(EdgeError::from)
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, CacheResult};
    use crate::memory::InMemoryCache;
    use crate::timing::parse_server_timing_entry;
    use edge_core::{handler_fn, FetchEvent, Params, StatusCode, Url};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        calls: Arc<AtomicUsize>,
        seen: Arc<std::sync::Mutex<Vec<Request>>>,
    }

    fn recording(status: StatusCode, headers: &[(&str, &str)]) -> (BoxHandler, Recorder) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let headers = Headers::from_pairs(headers.iter().copied()).unwrap();
        let (c, s) = (calls.clone(), seen.clone());
        let handler = handler_fn(move |ctx: RequestContext| {
            let calls = c.clone();
            let seen = s.clone();
            let headers = headers.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(ctx.request.clone());
                Ok(Response::new(status, headers, "body"))
            }
        });
        (handler, Recorder { calls, seen })
    }

    fn cacheable_handler() -> (BoxHandler, Recorder) {
        recording(StatusCode::OK, &[("Cache-Control", "max-age=60")])
    }

    fn ctx_for(request: Request) -> RequestContext {
        RequestContext::new(Arc::new(FetchEvent::new(request)), Params::new())
    }

    fn get(url: &str) -> RequestContext {
        ctx_for(Request::get(url).unwrap())
    }

    async fn serve(handler: &BoxHandler, ctx: RequestContext) -> Response {
        let event = Arc::clone(&ctx.event);
        let response = handler.handle(ctx).await.unwrap();
        event.take_pending().settle().await.unwrap();
        response
    }

    fn timing_statuses(response: &Response) -> Vec<CacheStatus> {
        response
            .headers()
            .get_all("Server-Timing")
            .iter()
            .filter_map(|e| parse_server_timing_entry(e))
            .map(|(status, _)| status)
            .collect()
    }

    // === Hit/Miss Tests ===

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        let first = serve(&handler, get("https://example.com/products")).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.put_count(), 1);
        assert_eq!(timing_statuses(&first), vec![CacheStatus::Miss]);

        let second = serve(&handler, get("https://example.com/products")).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.text(), "body");
        assert_eq!(timing_statuses(&second), vec![CacheStatus::Miss, CacheStatus::Hit]);
        assert_eq!(cache.put_count(), 1);
    }

    #[tokio::test]
    async fn test_write_waits_for_settle() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        let ctx = get("https://example.com/a");
        let event = Arc::clone(&ctx.event);
        handler.handle(ctx).await.unwrap();

        assert!(cache.is_empty());
        let pending = event.take_pending();
        assert_eq!(pending.len(), 1);
        pending.settle().await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_stacked_layers_accumulate_timings() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = cacheable_handler();
        let config = CacheConfig::new(cache.clone());
        let handler = CacheMiddleware::new(config.clone())
            .wrap(CacheMiddleware::new(config).wrap(inner));

        let response = serve(&handler, get("https://example.com/a")).await;
        assert_eq!(response.headers().get_all("Server-Timing").len(), 2);
    }

    // === Bypass Tests ===

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);
        let post = Request::builder(Method::POST, Url::parse("https://example.com/a").unwrap()).build();

        let response = serve(&handler, ctx_for(post)).await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.header("Server-Timing"), None);
        assert_eq!(cache.match_count(), 0);
        assert_eq!(cache.put_count(), 0);
    }

    #[tokio::test]
    async fn test_non_http_scheme_bypasses_cache() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        let response = serve(&handler, get("ftp://example.com/file")).await;
        assert_eq!(response.header("Server-Timing"), None);
        assert_eq!(cache.match_count(), 0);
    }

    #[test]
    fn test_is_cacheable() {
        assert!(is_cacheable(&Request::get("http://example.com").unwrap()));
        assert!(is_cacheable(&Request::get("https://example.com").unwrap()));
        assert!(!is_cacheable(&Request::get("ws://example.com").unwrap()));
        let head = Request::builder(Method::HEAD, Url::parse("https://example.com").unwrap()).build();
        assert!(!is_cacheable(&head));
    }

    // === Cacheability Tests ===

    #[tokio::test]
    async fn test_errors_are_not_stored_by_default() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = recording(StatusCode::NOT_FOUND, &[("Cache-Control", "max-age=60")]);
        let config = CacheConfig::new(cache.clone()).with_cache_control("public, max-age=300");
        let handler = CacheMiddleware::new(config).wrap(inner);

        let response = serve(&handler, get("https://example.com/missing")).await;
        assert_eq!(response.header("Cache-Control"), Some("no-store".to_string()));
        assert_eq!(cache.put_count(), 0);

        serve(&handler, get("https://example.com/missing")).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_stored_when_allowed() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = recording(StatusCode::NOT_FOUND, &[]);
        let config = CacheConfig::new(cache.clone())
            .with_cache_error(true)
            .with_cache_control("public, max-age=300");
        let handler = CacheMiddleware::new(config).wrap(inner);

        let first = serve(&handler, get("https://example.com/missing")).await;
        assert_eq!(first.header("Cache-Control"), Some("public, max-age=300".to_string()));
        let second = serve(&handler, get("https://example.com/missing")).await;

        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.put_count(), 1);
    }

    #[tokio::test]
    async fn test_allowed_error_keeps_handler_cache_control() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) =
            recording(StatusCode::INTERNAL_SERVER_ERROR, &[("Cache-Control", "max-age=60")]);
        let config = CacheConfig::new(cache.clone()).with_cache_error(true);
        let handler = CacheMiddleware::new(config).wrap(inner);

        let first = serve(&handler, get("https://example.com/flaky")).await;
        assert_eq!(first.header("Cache-Control"), Some("max-age=60".to_string()));
        assert_eq!(cache.put_count(), 1);

        let second = serve(&handler, get("https://example.com/flaky")).await;
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_without_cache_control_gets_no_store() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = recording(StatusCode::BAD_GATEWAY, &[]);
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        let ctx = get("https://example.com/upstream");
        let event = Arc::clone(&ctx.event);
        let response = handler.handle(ctx).await.unwrap();

        assert_eq!(response.header("Cache-Control"), Some("no-store".to_string()));
        assert!(event.take_pending().is_empty());
        assert_eq!(cache.put_count(), 0);
    }

    #[tokio::test]
    async fn test_without_cache_control_nothing_is_stored() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = recording(StatusCode::OK, &[]);
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        let ctx = get("https://example.com/a");
        let event = Arc::clone(&ctx.event);
        let response = handler.handle(ctx).await.unwrap();

        assert_eq!(response.header("Cache-Control"), None);
        assert!(event.take_pending().is_empty());
    }

    #[tokio::test]
    async fn test_handler_no_store_is_respected() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = recording(StatusCode::OK, &[("Cache-Control", "no-store")]);
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone())).wrap(inner);

        serve(&handler, get("https://example.com/a")).await;
        assert_eq!(cache.put_count(), 0);
    }

    // === Vary Tests ===

    #[tokio::test]
    async fn test_vary_headers_added_when_storing() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = recording(
            StatusCode::OK,
            &[("Cache-Control", "max-age=60"), ("Vary", "X-Origin-Foo")],
        );
        let config = CacheConfig::new(cache.clone())
            .vary_on("Accept-Language")
            .vary_on("Origin");
        let handler = CacheMiddleware::new(config).wrap(inner);

        let response = serve(&handler, get("https://example.com/a")).await;
        assert_eq!(
            response.header("Vary"),
            Some("X-Origin-Foo, Accept-Language".to_string())
        );
    }

    #[tokio::test]
    async fn test_vary_headers_not_added_when_not_storing() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = recording(StatusCode::OK, &[]);
        let handler = CacheMiddleware::new(CacheConfig::new(cache).vary_on("Accept")).wrap(inner);

        let response = serve(&handler, get("https://example.com/a")).await;
        assert_eq!(response.header("Vary"), None);
    }

    // === Configuration Tests ===

    #[tokio::test]
    async fn test_server_timings_can_be_disabled() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, _) = cacheable_handler();
        let config = CacheConfig::new(cache.clone()).with_server_timings(false);
        let handler = CacheMiddleware::new(config).wrap(inner);

        let response = serve(&handler, get("https://example.com/a")).await;
        assert_eq!(response.header("Server-Timing"), None);
        assert_eq!(cache.put_count(), 1);
    }

    #[tokio::test]
    async fn test_cdn_ttl_rebuilds_request_but_keys_on_original() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone()).with_cdn_ttl(120)).wrap(inner);

        let original = Request::get("https://example.com/a")
            .unwrap()
            .to_builder()
            .redirect(RedirectMode::Manual)
            .build();
        serve(&handler, ctx_for(original.clone())).await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen[0].edge_cache_ttl(), Some(120));
        assert_eq!(seen[0].redirect(), RedirectMode::Follow);
        assert!(cache
            .match_request(&original, MatchOptions::default())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_cdn_ttl_bounds_entry_lifetime() {
        let cache = Arc::new(InMemoryCache::new("default"));
        let (inner, recorder) = recording(StatusCode::OK, &[("Cache-Control", "public")]);
        let handler = CacheMiddleware::new(CacheConfig::new(cache.clone()).with_cdn_ttl(1)).wrap(inner);

        serve(&handler, get("https://example.com/a")).await;
        serve(&handler, get("https://example.com/a")).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        serve(&handler, get("https://example.com/a")).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_settings_defaults_and_resolution() {
        let settings: CacheSettings = serde_json::from_str(r#"{"cdn_ttl": 30}"#).unwrap();
        assert_eq!(settings.cache_name, "default");
        assert!(settings.server_timings);
        assert!(!settings.cache_error);

        let storage = CacheStorage::new();
        let config = settings.into_config(&storage);
        assert_eq!(config.cdn_ttl, Some(30));
        assert!(storage.has("default"));
    }

    // === Store Failure Tests ===

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn match_request(&self, _: &Request, _: MatchOptions) -> CacheResult<Option<Response>> {
            Err(CacheError::Match("backend offline".into()))
        }

        async fn put(&self, _: &Request, _: Response) -> CacheResult<()> {
            Err(CacheError::Put("backend offline".into()))
        }
    }

    #[tokio::test]
    async fn test_match_failure_propagates() {
        let (inner, recorder) = cacheable_handler();
        let handler = CacheMiddleware::new(CacheConfig::new(Arc::new(BrokenStore))).wrap(inner);

        let result = handler.handle(get("https://example.com/a")).await;
        assert!(matches!(result, Err(EdgeError::Cache { operation: "match", .. })));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }
}
