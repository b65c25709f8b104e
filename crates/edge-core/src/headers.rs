//! Immutable, case-insensitive header set.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{EdgeError, Result};

/// Common header names used across middlewares.
pub mod names {
    /// `Cache-Control` header.
    pub const CACHE_CONTROL: &str = "cache-control";
    /// `Vary` header.
    pub const VARY: &str = "vary";
    /// `Server-Timing` header.
    pub const SERVER_TIMING: &str = "server-timing";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Location` header.
    pub const LOCATION: &str = "location";
    /// `Content-Type` header.
    pub const CONTENT_TYPE: &str = "content-type";
}

/// An ordered, case-insensitive multi-map of header values.
///
/// `Headers` is a value type: `set`, `append` and `delete` return a new set
/// and leave the receiver untouched, so a header set captured by one
/// request or response can never be changed behind its back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    map: HeaderMap,
}

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header set from name/value pairs, appending repeated names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let (name, value) = parse_entry(name.as_ref(), value.as_ref())?;
            map.append(name, value);
        }
        Ok(Self { map })
    }

    /// Get the combined value of a header (entries joined with `", "`).
    pub fn get(&self, name: &str) -> Option<String> {
        let values = self.get_all(name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Get every entry of a header, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect()
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Return a copy with `name` replaced by a single `value`.
    pub fn set(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_entry(name, value)?;
        let mut map = self.map.clone();
        map.insert(name, value);
        Ok(Self { map })
    }

    /// Return a copy with `value` added as a new entry of `name`.
    pub fn append(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_entry(name, value)?;
        let mut map = self.map.clone();
        map.append(name, value);
        Ok(Self { map })
    }

    /// Return a copy without any entry named `name`.
    pub fn delete(&self, name: &str) -> Self {
        let mut map = self.map.clone();
        map.remove(name);
        Self { map }
    }

    /// Iterate over every `(name, value)` entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.map
            .iter()
            .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
    }

    /// Distinct header names, in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.map.keys().map(|k| k.as_str()).collect()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.map.keys_len()
    }

    /// Whether the set has no headers.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Borrow the underlying `http` header map.
    pub fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

fn parse_entry(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| EdgeError::invalid_header(name, e))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| EdgeError::invalid_header(name, e))?;
    Ok((header_name, header_value))
}

/// Split a header value into its comma-separated tokens.
///
/// Tokens are trimmed and empty tokens are dropped.
pub fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}
