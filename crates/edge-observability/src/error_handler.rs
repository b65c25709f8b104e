//! Handler fault recovery and error forwarding.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{
    BoxHandler, EdgeError, Handler, Headers, Middleware, RequestContext, Response, Result,
    StatusCode,
};
use serde::{Deserialize, Serialize};

/// Query parameter that requests debug output.
pub const DEBUG_PARAM: &str = "debug";

/// Receives handler faults for external reporting.
///
/// The context gives access to the event, so a forwarder can register its
/// own background work with `ctx.event.wait_until`. A failing forwarder
/// fails the request.
#[async_trait]
pub trait ErrorForwarder: Send + Sync {
    /// Report `error` raised while handling `ctx`.
    async fn forward(&self, error: &EdgeError, ctx: &RequestContext) -> Result<()>;
}

/// Forwarder that records faults as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingForwarder;

#[async_trait]
impl ErrorForwarder for TracingForwarder {
    async fn forward(&self, error: &EdgeError, ctx: &RequestContext) -> Result<()> {
        tracing::error!(
            method = %ctx.request.method(),
            url = %ctx.request.url(),
            params = ?ctx.params,
            error = %error,
            "unhandled handler fault"
        );
        Ok(())
    }
}

/// Error middleware configuration.
#[derive(Clone, Default)]
pub struct ErrorHandlerConfig {
    /// Allow `?debug=true` to put the diagnostic text in the 500 body.
    pub enable_debug: bool,
    /// Where faults are reported.
    pub forwarder: Option<Arc<dyn ErrorForwarder>>,
}

impl ErrorHandlerConfig {
    /// Defaults: no debug output, no forwarding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow debug output.
    pub fn with_debug(mut self, enable: bool) -> Self {
        self.enable_debug = enable;
        self
    }

    /// Report faults to `forwarder`.
    pub fn with_forwarder<F: ErrorForwarder + 'static>(mut self, forwarder: F) -> Self {
        self.forwarder = Some(Arc::new(forwarder));
        self
    }
}

impl std::fmt::Debug for ErrorHandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandlerConfig")
            .field("enable_debug", &self.enable_debug)
            .field("forwarder", &self.forwarder.is_some())
            .finish()
    }
}

/// Serializable error middleware settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorHandlerSettings {
    #[serde(default)]
    pub enable_debug: bool,
    /// Report faults through [`TracingForwarder`].
    #[serde(default)]
    pub forward_to_tracing: bool,
}

impl From<ErrorHandlerSettings> for ErrorHandlerConfig {
    fn from(settings: ErrorHandlerSettings) -> Self {
        let config = Self::new().with_debug(settings.enable_debug);
        if settings.forward_to_tracing {
            config.with_forwarder(TracingForwarder)
        } else {
            config
        }
    }
}

/// Turns handler faults into `500` responses.
///
/// Place it outermost to catch faults from every layer inside it,
/// including cache store failures.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandlerMiddleware {
    config: Arc<ErrorHandlerConfig>,
}

impl ErrorHandlerMiddleware {
    /// Create the middleware.
    pub fn new(config: ErrorHandlerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Middleware for ErrorHandlerMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(ErrorHandler {
            config: Arc::clone(&self.config),
            next,
        })
    }

    fn name(&self) -> &'static str {
        "error"
    }
}

struct ErrorHandler {
    config: Arc<ErrorHandlerConfig>,
    next: BoxHandler,
}

#[async_trait]
impl Handler for ErrorHandler {
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        let snapshot = ctx.clone();
        let error = match self.next.handle(ctx).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        tracing::debug!(url = %snapshot.request.url(), error = %error, "recovering from handler fault");

        if let Some(forwarder) = &self.config.forwarder {
            forwarder.forward(&error, &snapshot).await?;
        }

        let debug = self.config.enable_debug
            && snapshot.request.query_param(DEBUG_PARAM).as_deref() == Some("true");
        let body = if debug { error.diagnostic() } else { String::new() };

        Ok(Response::new(StatusCode::INTERNAL_SERVER_ERROR, Headers::new(), body))
    }
}
