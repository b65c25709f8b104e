//! Header management middleware.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{
    manage_headers, BoxHandler, ExistingPolicy, Handler, HeaderSubject, Middleware,
    RequestContext, Response, Result,
};
use serde::{Deserialize, Serialize};

/// Header management configuration.
///
/// Request headers are managed before the wrapped handler runs, response
/// headers after. Additions are merged according to `existing`; removals
/// always apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadersConfig {
    /// Headers merged into the request passed down.
    #[serde(default)]
    pub add_request_headers: BTreeMap<String, String>,
    /// Headers deleted from the request passed down.
    #[serde(default)]
    pub remove_request_headers: Vec<String>,
    /// Headers merged into the response.
    #[serde(default)]
    pub add_response_headers: BTreeMap<String, String>,
    /// Headers deleted from the response.
    #[serde(default)]
    pub remove_response_headers: Vec<String>,
    /// Merge policy for headers that already have values.
    #[serde(default)]
    pub existing: ExistingPolicy,
}

impl HeadersConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn add_request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_request_headers.insert(name.into(), value.into());
        self
    }

    /// Remove a request header.
    pub fn remove_request_header(mut self, name: impl Into<String>) -> Self {
        self.remove_request_headers.push(name.into());
        self
    }

    /// Add a response header.
    pub fn add_response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_response_headers.insert(name.into(), value.into());
        self
    }

    /// Remove a response header.
    pub fn remove_response_header(mut self, name: impl Into<String>) -> Self {
        self.remove_response_headers.push(name.into());
        self
    }

    /// Set the merge policy.
    pub fn with_existing(mut self, existing: ExistingPolicy) -> Self {
        self.existing = existing;
        self
    }

    fn touches_request(&self) -> bool {
        !self.add_request_headers.is_empty() || !self.remove_request_headers.is_empty()
    }
}

fn apply<S: HeaderSubject>(
    subject: &S,
    add: &BTreeMap<String, String>,
    remove: &[String],
    existing: ExistingPolicy,
) -> Result<S> {
    let add: Vec<(&String, &String)> = add.iter().collect();
    manage_headers(subject, &add, remove, existing)
}

/// Manages request and response headers around a handler.
#[derive(Debug, Clone, Default)]
pub struct HeadersMiddleware {
    config: Arc<HeadersConfig>,
}

impl HeadersMiddleware {
    /// Create the middleware.
    pub fn new(config: HeadersConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Middleware for HeadersMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(HeadersHandler {
            config: Arc::clone(&self.config),
            next,
        })
    }

    fn name(&self) -> &'static str {
        "headers"
    }
}

struct HeadersHandler {
    config: Arc<HeadersConfig>,
    next: BoxHandler,
}

#[async_trait]
impl Handler for HeadersHandler {
    async fn handle(&self, ctx: RequestContext) -> Result<Response> {
        let config = &self.config;

        let ctx = if config.touches_request() {
            let request = apply(
                &ctx.request,
                &config.add_request_headers,
                &config.remove_request_headers,
                config.existing,
            )?;
            ctx.with_request(request)
        } else {
            ctx
        };

        let response = self.next.handle(ctx).await?;
        apply(
            &response,
            &config.add_response_headers,
            &config.remove_response_headers,
            config.existing,
        )
    }
}
