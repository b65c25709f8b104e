//! Top-level fetch event dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{Params, RequestContext};
use crate::error::{EdgeError, Result};
use crate::event::{FetchEvent, PendingTasks};
use crate::handler::{BoxHandler, BoxMiddleware, Middleware, Pipeline};
use crate::request::Request;
use crate::response::Response;

/// A matched route: the handler to run and the parameters it extracted.
#[derive(Clone)]
pub struct RouteMatch {
    /// Handler for the route.
    pub handler: BoxHandler,
    /// Extracted parameters.
    pub params: Params,
}

impl RouteMatch {
    /// Match without parameters.
    pub fn new(handler: BoxHandler) -> Self {
        Self {
            handler,
            params: Params::new(),
        }
    }

    /// Attach route parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Decides which handler applies to an event.
pub trait RouteMatcher: Send + Sync {
    /// Return the matching route, if any.
    fn matches(&self, event: &FetchEvent) -> Option<RouteMatch>;
}

impl<F> RouteMatcher for F
where
    F: Fn(&FetchEvent) -> Option<RouteMatch> + Send + Sync,
{
    fn matches(&self, event: &FetchEvent) -> Option<RouteMatch> {
        self(event)
    }
}

/// Network fetch used to pass unmatched requests through to the origin.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request` from its origin.
    async fn fetch(&self, request: Request) -> Result<Response>;
}

/// The outcome of dispatching one event.
#[derive(Debug)]
pub struct Dispatched {
    /// Response for the caller.
    pub response: Response,
    /// Background work the host must settle before finishing the invocation.
    pub pending: PendingTasks,
}

/// Entry point turning fetch events into responses.
#[derive(Clone)]
pub struct EventHandler {
    matcher: Arc<dyn RouteMatcher>,
    origin: Option<Arc<dyn Fetcher>>,
    originless: bool,
    pipeline: Pipeline,
}

impl EventHandler {
    /// Create a dispatcher for a route matcher.
    pub fn new<M: RouteMatcher + 'static>(matcher: M) -> Self {
        Self {
            matcher: Arc::new(matcher),
            origin: None,
            originless: false,
            pipeline: Pipeline::new(),
        }
    }

    /// Answer unmatched events with 404 instead of calling the origin.
    pub fn originless(mut self, originless: bool) -> Self {
        self.originless = originless;
        self
    }

    /// Set the fetcher used to pass unmatched events through.
    pub fn with_origin<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.origin = Some(Arc::new(fetcher));
        self
    }

    /// Append a middleware (inside those already added).
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.pipeline = self.pipeline.with(middleware);
        self
    }

    /// Append an already shared middleware.
    pub fn with_boxed_middleware(mut self, middleware: BoxMiddleware) -> Self {
        self.pipeline = self.pipeline.with_boxed(middleware);
        self
    }

    /// Replace the whole middleware stack.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Dispatch one event.
    ///
    /// Matched events run through the middleware stack; unmatched ones get
    /// a 404 when originless and are passed to the origin untouched
    /// otherwise. Background tasks registered while handling are returned
    /// in [`Dispatched::pending`], also when no route matched.
    ///
    /// On failure the tasks registered so far are dropped. Hosts that must
    /// settle them either way use [`EventHandler::respond`].
    pub async fn handle(&self, event: FetchEvent) -> Result<Dispatched> {
        let event = Arc::new(event);
        let response = self.respond(&event).await?;
        Ok(Dispatched {
            response,
            pending: event.take_pending(),
        })
    }

    /// Dispatch one event the caller keeps hold of.
    ///
    /// Background tasks stay registered on `event` whether or not dispatch
    /// succeeds; collect them with [`FetchEvent::take_pending`].
    pub async fn respond(&self, event: &Arc<FetchEvent>) -> Result<Response> {
        match self.matcher.matches(event) {
            Some(route) => {
                tracing::debug!(
                    url = %event.request().url(),
                    layers = self.pipeline.len(),
                    "route matched"
                );
                let ctx = RequestContext::new(Arc::clone(event), route.params);
                self.pipeline.apply(route.handler).handle(ctx).await
            }
            None if self.originless => {
                tracing::debug!(url = %event.request().url(), "no route matched, originless");
                Ok(Response::not_found())
            }
            None => match &self.origin {
                Some(origin) => {
                    tracing::debug!(url = %event.request().url(), "no route matched, passing through");
                    origin.fetch(event.request().clone()).await
                }
                None => Err(EdgeError::NoOrigin(event.request().url().to_string())),
            },
        }
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("originless", &self.originless)
            .field("has_origin", &self.origin.is_some())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
