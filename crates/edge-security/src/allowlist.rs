//! Origin allowlist for cross-origin requests.

use serde::{Deserialize, Serialize};

/// Result type for allowlist operations.
pub type AllowlistResult<T> = Result<T, AllowlistError>;

/// Errors from allowlist operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllowlistError {
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Allowlist deciding which request origins receive CORS headers.
///
/// Entries are exact origins (`https://app.example.com`) or patterns with
/// `*` wildcards (`https://*.example.com`). Denied entries take precedence
/// over allowed ones; an origin matching nothing is rejected unless the
/// list was built with [`OriginAllowlist::any`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAllowlist {
    /// Allowed exact origins.
    #[serde(default)]
    allowed_origins: Vec<String>,
    /// Allowed origin patterns.
    #[serde(default)]
    allowed_patterns: Vec<String>,
    /// Explicitly denied origins.
    #[serde(default)]
    denied_origins: Vec<String>,
    /// Denied origin patterns.
    #[serde(default)]
    denied_patterns: Vec<String>,
    /// Allow any origin not explicitly denied.
    #[serde(default)]
    allow_any: bool,
}

impl OriginAllowlist {
    /// Create an empty allowlist (deny by default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow every origin that is not explicitly denied.
    pub fn any() -> Self {
        Self {
            allow_any: true,
            ..Default::default()
        }
    }

    /// Build an allowlist from configuration entries.
    ///
    /// Entries prefixed with `!` are denials; entries containing `*` are
    /// patterns; a lone `*` allows any origin.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> AllowlistResult<Self> {
        let mut list = Self::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            let (deny, value) = match entry.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, entry),
            };
            validate_entry(value)?;

            list = match (deny, value) {
                (false, "*") => Self {
                    allow_any: true,
                    ..list
                },
                (true, _) if value.contains('*') => list.deny_pattern(value),
                (true, _) => list.deny_origin(value),
                (false, _) if value.contains('*') => list.allow_pattern(value),
                (false, _) => list.allow_origin(value),
            };
        }
        Ok(list)
    }

    /// Allow a specific origin.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(normalize(&origin.into()));
        self
    }

    /// Allow multiple origins.
    pub fn allow_origins(mut self, origins: &[&str]) -> Self {
        for origin in origins {
            self.allowed_origins.push(normalize(origin));
        }
        self
    }

    /// Allow an origin pattern (supports `*` as wildcard).
    ///
    /// Examples:
    /// - `https://*.example.com` - matches `https://app.example.com`
    /// - `http://localhost:*` - matches any local port
    pub fn allow_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_patterns.push(normalize(&pattern.into()));
        self
    }

    /// Deny a specific origin (takes precedence over allow).
    pub fn deny_origin(mut self, origin: impl Into<String>) -> Self {
        self.denied_origins.push(normalize(&origin.into()));
        self
    }

    /// Deny an origin pattern.
    pub fn deny_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.denied_patterns.push(normalize(&pattern.into()));
        self
    }

    /// Check if an origin is allowed.
    pub fn check_origin(&self, origin: &str) -> AllowlistResult<()> {
        let origin_lower = normalize(origin);
        let rejected = || AllowlistError::OriginNotAllowed(origin.to_string());

        // Denials first
        if self.denied_origins.contains(&origin_lower)
            || self.denied_patterns.iter().any(|p| matches_pattern(&origin_lower, p))
        {
            return Err(rejected());
        }

        if self.allow_any
            || self.allowed_origins.contains(&origin_lower)
            || self.allowed_patterns.iter().any(|p| matches_pattern(&origin_lower, p))
        {
            Ok(())
        } else {
            Err(rejected())
        }
    }

    /// Whether `origin` passes [`OriginAllowlist::check_origin`].
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.check_origin(origin).is_ok()
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_lowercase()
}

fn validate_entry(entry: &str) -> AllowlistResult<()> {
    if entry.is_empty() {
        return Err(AllowlistError::InvalidPattern("empty entry".to_string()));
    }
    if entry.contains("**") {
        return Err(AllowlistError::InvalidPattern(entry.to_string()));
    }
    Ok(())
}

fn matches_pattern(origin: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return origin == pattern;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let Some(mut remaining) = origin.strip_prefix(first) else {
        return false;
    };

    // Middle segments must appear in order; the last one anchors the end.
    for (i, part) in rest.iter().enumerate() {
        if i == rest.len() - 1 {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Matching Tests ===

    #[test]
    fn test_exact_origin() {
        let list = OriginAllowlist::new().allow_origin("https://app.example.com");
        assert!(list.is_allowed("https://app.example.com"));
        assert!(list.is_allowed("HTTPS://APP.EXAMPLE.COM/"));
        assert!(!list.is_allowed("https://evil.com"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let list = OriginAllowlist::new().allow_pattern("https://*.example.com");
        assert!(list.is_allowed("https://app.example.com"));
        assert!(list.is_allowed("https://a.b.example.com"));
        assert!(!list.is_allowed("http://app.example.com"));
        assert!(!list.is_allowed("https://example.com.evil.com"));
    }

    #[test]
    fn test_port_wildcard() {
        let list = OriginAllowlist::new().allow_pattern("http://localhost:*");
        assert!(list.is_allowed("http://localhost:3000"));
        assert!(!list.is_allowed("http://127.0.0.1:3000"));
    }

    #[test]
    fn test_deny_takes_precedence() {
        let list = OriginAllowlist::new()
            .allow_pattern("https://*.example.com")
            .deny_origin("https://admin.example.com");
        assert!(list.is_allowed("https://app.example.com"));
        assert_eq!(
            list.check_origin("https://admin.example.com"),
            Err(AllowlistError::OriginNotAllowed("https://admin.example.com".to_string()))
        );
    }

    #[test]
    fn test_any_still_honours_denials() {
        let list = OriginAllowlist::any().deny_pattern("*.evil.com");
        assert!(list.is_allowed("https://anything.test"));
        assert!(!list.is_allowed("https://www.evil.com"));
    }

    #[test]
    fn test_empty_list_rejects_everything() {
        assert!(!OriginAllowlist::new().is_allowed("https://app.example.com"));
    }

    // === Configuration Tests ===

    #[test]
    fn test_from_entries() {
        let list = OriginAllowlist::from_entries(&[
            "https://app.example.com",
            "https://*.example.org",
            "!https://old.example.org",
        ])
        .unwrap();

        assert!(list.is_allowed("https://app.example.com"));
        assert!(list.is_allowed("https://new.example.org"));
        assert!(!list.is_allowed("https://old.example.org"));
    }

    #[test]
    fn test_from_entries_star_allows_any() {
        let list = OriginAllowlist::from_entries(&["*"]).unwrap();
        assert!(list.is_allowed("https://whatever.test"));
    }

    #[test]
    fn test_from_entries_rejects_bad_entries() {
        assert!(matches!(
            OriginAllowlist::from_entries(&[""]),
            Err(AllowlistError::InvalidPattern(_))
        ));
        assert!(matches!(
            OriginAllowlist::from_entries(&["https://**.example.com"]),
            Err(AllowlistError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_deserialize() {
        let list: OriginAllowlist =
            serde_json::from_str(r#"{"allowed_origins": ["https://a.test"]}"#).unwrap();
        assert!(list.is_allowed("https://a.test"));
        assert!(!list.is_allowed("https://b.test"));
    }
}
