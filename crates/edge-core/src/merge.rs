//! Header merge engine shared by the header-writing middlewares.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::headers::{names, split_values, Headers};
use crate::request::Request;
use crate::response::Response;

/// What to do when a header being added already has values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExistingPolicy {
    /// Keep the current values and add the new ones (deduplicated).
    #[default]
    Combine,
    /// Replace the current values with the new ones (deduplicated).
    Override,
    /// Leave a header that already has a value untouched.
    Skip,
}

impl From<&str> for ExistingPolicy {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "combine" => Self::Combine,
            "override" => Self::Override,
            // Unknown policies degrade to a no-op on existing headers.
            _ => Self::Skip,
        }
    }
}

impl From<String> for ExistingPolicy {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Anything carrying a header set that can be rebuilt with another one.
pub trait HeaderSubject: Sized {
    /// Current headers.
    fn headers(&self) -> &Headers;

    /// A new subject identical to this one except for its headers.
    fn with_headers(&self, headers: Headers) -> Self;
}

impl HeaderSubject for Request {
    fn headers(&self) -> &Headers {
        Request::headers(self)
    }

    fn with_headers(&self, headers: Headers) -> Self {
        self.to_builder().headers(headers).build()
    }
}

impl HeaderSubject for Response {
    fn headers(&self) -> &Headers {
        Response::headers(self)
    }

    fn with_headers(&self, headers: Headers) -> Self {
        Response::with_headers(self, headers)
    }
}

/// Merge one header's current values with incoming values.
///
/// Returns `None` when the header must be left as it is.
pub fn merge_values(
    current: &[String],
    incoming: &[String],
    existing: ExistingPolicy,
) -> Option<Vec<String>> {
    if incoming.is_empty() {
        return None;
    }

    match existing {
        ExistingPolicy::Combine => Some(unique(current.iter().chain(incoming))),
        ExistingPolicy::Override => Some(unique(incoming.iter())),
        ExistingPolicy::Skip if !current.is_empty() => None,
        ExistingPolicy::Skip => Some(unique(incoming.iter())),
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

/// Apply additions then removals to a subject's headers.
///
/// Each added value is split on `,`, trimmed and deduplicated before being
/// merged according to `existing`; the merged list is written back joined
/// with `,`. Every header named in `remove` is deleted afterwards,
/// whatever the policy. The subject itself is never modified.
pub fn manage_headers<S, K, V>(
    subject: &S,
    add: &[(K, V)],
    remove: &[String],
    existing: ExistingPolicy,
) -> Result<S>
where
    S: HeaderSubject,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = subject.headers().clone();

    for (name, value) in add {
        let name = name.as_ref();
        let incoming = split_values(value.as_ref());
        let current = headers
            .get(name)
            .map(|v| split_values(&v))
            .unwrap_or_default();

        if let Some(merged) = merge_values(&current, &incoming, existing) {
            headers = headers.set(name, &merged.join(","))?;
        }
    }

    for name in remove {
        headers = headers.delete(name);
    }

    Ok(subject.with_headers(headers))
}

/// Append `token` to `Vary` unless it already appears there.
///
/// The presence check is a plain substring test on the combined `Vary`
/// value, not a token comparison: `X-Origin-Foo` already "contains"
/// `Origin`.
pub fn append_vary(headers: &Headers, token: &str) -> Result<Headers> {
    match headers.get(names::VARY) {
        Some(vary) if vary.contains(token) => Ok(headers.clone()),
        _ => headers.append(names::VARY, token),
    }
}
