//! Per-event request context.

use std::collections::HashMap;
use std::sync::Arc;

use crate::event::FetchEvent;
use crate::request::Request;

/// Parameters extracted by the route matcher (e.g. `:id` from `/products/:id`).
pub type Params = HashMap<String, String>;

/// The context passed down a handler chain.
///
/// `request` starts as the event's request; middlewares that rewrite the
/// request derive a new context with [`RequestContext::with_request`]
/// while `event` keeps pointing at the original inbound event.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The event being served.
    pub event: Arc<FetchEvent>,
    /// The request as seen by the current layer.
    pub request: Request,
    /// Route parameters.
    pub params: Params,
}

impl RequestContext {
    /// Build the initial context for an event.
    pub fn new(event: Arc<FetchEvent>, params: Params) -> Self {
        let request = event.request().clone();
        Self {
            event,
            request,
            params,
        }
    }

    /// Build a context for a bare request (wrapped in a fresh event).
    pub fn from_request(request: Request) -> Self {
        Self::new(Arc::new(FetchEvent::new(request)), Params::new())
    }

    /// A new context carrying a different request.
    pub fn with_request(&self, request: Request) -> Self {
        Self {
            event: Arc::clone(&self.event),
            request,
            params: self.params.clone(),
        }
    }

    /// Get a route parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }
}
