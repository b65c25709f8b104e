//! Immutable inbound/outbound request.

use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::headers::Headers;

/// How a fetch should react when the origin answers with a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// Follow redirects and return the final response.
    #[default]
    Follow,
    /// Treat a redirect as a network error.
    Error,
    /// Return redirects to the caller untouched.
    Manual,
}

impl RedirectMode {
    /// The mode name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Error => "error",
            Self::Manual => "manual",
        }
    }
}

/// An HTTP request.
///
/// Requests are never changed in place; use [`Request::to_builder`] to
/// rebuild one with overrides (same body, replaced metadata).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Bytes,
    redirect: RedirectMode,
    edge_cache_ttl: Option<u32>,
}

impl Request {
    /// Start building a request.
    pub fn builder(method: Method, url: Url) -> RequestBuilder {
        RequestBuilder {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
            redirect: RedirectMode::default(),
            edge_cache_ttl: None,
        }
    }

    /// A bodiless `GET` request for `url`.
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::builder(Method::GET, Url::parse(url)?).build())
    }

    /// Rebuild this request with overrides.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            redirect: self.redirect,
            edge_cache_ttl: self.edge_cache_ttl,
        }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Redirect handling mode for downstream fetches.
    pub fn redirect(&self) -> RedirectMode {
        self.redirect
    }

    /// Edge cache duration directive in seconds, if set.
    pub fn edge_cache_ttl(&self) -> Option<u32> {
        self.edge_cache_ttl
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name)
    }

    /// Get a query parameter by name (first occurrence).
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: Headers,
    body: Bytes,
    redirect: RedirectMode,
    edge_cache_ttl: Option<u32>,
}

impl RequestBuilder {
    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the URL.
    pub fn url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Replace the header set.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set one header, replacing existing entries.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers = self.headers.set(name, value)?;
        Ok(self)
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the redirect mode.
    pub fn redirect(mut self, mode: RedirectMode) -> Self {
        self.redirect = mode;
        self
    }

    /// Set the edge cache duration directive.
    pub fn edge_cache_ttl(mut self, seconds: u32) -> Self {
        self.edge_cache_ttl = Some(seconds);
        self
    }

    /// Build the request.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            redirect: self.redirect,
            edge_cache_ttl: self.edge_cache_ttl,
        }
    }
}
