//! Handler and middleware contracts, and their composition.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::response::Response;

/// Produces a response for a request context.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request.
    async fn handle(&self, ctx: RequestContext) -> Result<Response>;
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Handler backed by an async closure. See [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Turn an async closure into a [`BoxHandler`].
///
/// ```ignore
/// let hello = handler_fn(|_ctx| async { Ok(Response::ok("hello")) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(HandlerFn { f })
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        (self.f)(ctx).await
    }
}

/// Wraps one handler to produce another.
pub trait Middleware: Send + Sync {
    /// Wrap `next`, returning the handler that runs this layer around it.
    fn wrap(&self, next: BoxHandler) -> BoxHandler;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Shared, type-erased middleware.
pub type BoxMiddleware = Arc<dyn Middleware>;

/// Middleware backed by a closure. See [`middleware_fn`].
pub struct MiddlewareFn<F> {
    f: F,
}

/// Turn a `next -> handler` closure into a [`BoxMiddleware`].
pub fn middleware_fn<F>(f: F) -> BoxMiddleware
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    Arc::new(MiddlewareFn { f })
}

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (self.f)(next)
    }
}

/// Fold `middlewares` around `handler`, first one outermost.
///
/// `apply_middlewares(h, &[a, b, c])` is `a.wrap(b.wrap(c.wrap(h)))`; with
/// no middlewares the very same `handler` is returned.
pub fn apply_middlewares(handler: BoxHandler, middlewares: &[BoxMiddleware]) -> BoxHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware.wrap(next))
}

/// Ordered middleware stack, outermost first.
#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<BoxMiddleware>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware inside the ones already added.
    pub fn with<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with_boxed(Arc::new(middleware))
    }

    /// Add an already shared middleware.
    pub fn with_boxed(mut self, middleware: BoxMiddleware) -> Self {
        self.layers.push(middleware);
        self
    }

    /// The middlewares, outermost first.
    pub fn middlewares(&self) -> &[BoxMiddleware] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the pipeline has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Build the composed handler around `handler`.
    pub fn apply(&self, handler: BoxHandler) -> BoxHandler {
        apply_middlewares(handler, &self.layers)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.layers.iter().map(|m| m.name()).collect();
        f.debug_struct("Pipeline").field("layers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Tag {
        tag: &'static str,
        log: Log,
    }

    impl Middleware for Tag {
        fn wrap(&self, next: BoxHandler) -> BoxHandler {
            let tag = self.tag;
            let log = self.log.clone();
            handler_fn(move |ctx| {
                let next = next.clone();
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{}:pre", tag));
                    let response = next.handle(ctx).await?;
                    log.lock().unwrap().push(format!("{}:post", tag));
                    let headers = response.headers().append("X-Order", tag)?;
                    Ok(response.with_headers(headers))
                }
            })
        }

        fn name(&self) -> &'static str {
            self.tag
        }
    }

    fn ok_handler() -> BoxHandler {
        handler_fn(|_ctx| async { Ok(Response::ok("ok")) })
    }

    fn ctx() -> RequestContext {
        RequestContext::from_request(Request::get("https://example.com").unwrap())
    }

    // === Composition Tests ===

    #[test]
    fn test_apply_without_middlewares_is_identity() {
        let handler = ok_handler();
        let composed = apply_middlewares(handler.clone(), &[]);
        assert!(Arc::ptr_eq(&handler, &composed));

        let composed = Pipeline::new().apply(handler.clone());
        assert!(Arc::ptr_eq(&handler, &composed));
    }

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let log: Log = Arc::default();
        let a: BoxMiddleware = Arc::new(Tag { tag: "a", log: log.clone() });
        let b: BoxMiddleware = Arc::new(Tag { tag: "b", log: log.clone() });

        let handler = apply_middlewares(ok_handler(), &[a, b]);
        let response = handler.handle(ctx()).await.unwrap();

        assert_eq!(response.headers().get_all("x-order"), vec!["b", "a"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:pre", "b:pre", "b:post", "a:post"]
        );
    }

    #[tokio::test]
    async fn test_pipeline_matches_apply_middlewares() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .with(Tag { tag: "outer", log: log.clone() })
            .with(Tag { tag: "inner", log: log.clone() });

        assert_eq!(pipeline.len(), 2);
        assert_eq!(format!("{:?}", pipeline), r#"Pipeline { layers: ["outer", "inner"] }"#);

        let response = pipeline.apply(ok_handler()).handle(ctx()).await.unwrap();
        assert_eq!(response.headers().get_all("x-order"), vec!["inner", "outer"]);
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_middleware_fn_wraps_handler() {
        let upper = middleware_fn(|next: BoxHandler| {
            handler_fn(move |ctx| {
                let next = next.clone();
                async move {
                    let response = next.handle(ctx).await?;
                    Ok(Response::ok(response.text().to_uppercase()))
                }
            })
        });

        let response = apply_middlewares(ok_handler(), &[upper]).handle(ctx()).await.unwrap();
        assert_eq!(response.text(), "OK");
    }
}
