//! In-memory named cache storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edge_core::{names, split_values, Method, Request, Response};

use crate::error::{CacheError, CacheResult};
use crate::store::{CacheStore, MatchOptions};

/// A stored response plus what is needed to decide whether it still applies.
#[derive(Debug, Clone)]
struct StoredEntry {
    response: Response,
    /// Request header values captured for each name listed in `Vary`.
    vary: Vec<(String, Option<String>)>,
    /// `Vary: *` entries never match.
    vary_any: bool,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(request: &Request, response: Response) -> Self {
        let vary_tokens = response
            .header(names::VARY)
            .map(|v| split_values(&v))
            .unwrap_or_default();

        let vary_any = vary_tokens.iter().any(|t| t == "*");
        let vary = vary_tokens
            .into_iter()
            .filter(|t| t != "*")
            .map(|name| {
                let value = request.header(&name);
                (name.to_ascii_lowercase(), value)
            })
            .collect();

        let expires_at = freshness_lifetime(&response)
            .or_else(|| request.edge_cache_ttl().map(|s| Duration::from_secs(u64::from(s))))
            // Lifetimes past what `Instant` can represent never expire.
            .and_then(|ttl| Instant::now().checked_add(ttl));

        Self {
            response,
            vary,
            vary_any,
            expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn matches_vary(&self, request: &Request) -> bool {
        !self.vary_any
            && self
                .vary
                .iter()
                .all(|(name, value)| request.header(name) == *value)
    }
}

/// Freshness lifetime from `s-maxage`, falling back to `max-age`.
fn freshness_lifetime(response: &Response) -> Option<Duration> {
    let cache_control = response.header(names::CACHE_CONTROL)?;
    let mut max_age = None;
    let mut s_maxage = None;

    for directive in split_values(&cache_control) {
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };
        let Ok(seconds) = value.trim().trim_matches('"').parse::<u64>() else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "s-maxage" => s_maxage = Some(seconds),
            "max-age" => max_age = Some(seconds),
            _ => {}
        }
    }

    s_maxage.or(max_age).map(Duration::from_secs)
}

fn cache_key(request: &Request) -> String {
    let mut url = request.url().clone();
    url.set_fragment(None);
    url.into()
}

/// A single named in-memory cache.
///
/// Entries are keyed by URL and only `GET` requests can be stored, so the
/// effective key is method + URL. Matching honours the stored `Vary`
/// annotations and the entry's freshness lifetime; expired entries are
/// dropped on lookup.
#[derive(Debug)]
pub struct InMemoryCache {
    name: String,
    entries: RwLock<HashMap<String, StoredEntry>>,
    matches: AtomicUsize,
    puts: AtomicUsize,
}

impl InMemoryCache {
    /// Create an empty cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            matches: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    /// The name this cache was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored entries (expired ones included until looked up).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups served so far.
    pub fn match_count(&self) -> usize {
        self.matches.load(Ordering::Relaxed)
    }

    /// Number of successful puts so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    /// Remove the entry stored for `request`.
    pub fn delete(&self, request: &Request) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&cache_key(request))
            .is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Drop the entry under `key` if it is still expired at `now`.
    ///
    /// Re-checked under the write lock: a put may have replaced the entry
    /// since it was seen expired.
    fn evict_if_expired(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            return false;
        }
        tracing::debug!(cache = %self.name, key, "evicting expired entry");
        entries.remove(key);
        true
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> CacheResult<Option<Response>> {
        self.matches.fetch_add(1, Ordering::Relaxed);

        if !options.ignore_method && request.method() != Method::GET {
            return Ok(None);
        }

        let key = cache_key(request);
        let now = Instant::now();

        let found = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.is_expired(now) => None,
                Some(entry) => Some(entry.clone()),
            }
        };

        match found {
            Some(entry) if entry.matches_vary(request) => Ok(Some(entry.response)),
            Some(_) => Ok(None),
            None => {
                self.evict_if_expired(&key, now);
                Ok(None)
            }
        }
    }

    async fn put(&self, request: &Request, response: Response) -> CacheResult<()> {
        if request.method() != Method::GET {
            return Err(CacheError::UnsupportedMethod(request.method().to_string()));
        }

        let key = cache_key(request);
        let entry = StoredEntry::new(request, response);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Registry of named caches.
///
/// Opening the same name twice yields the same shared cache. Clones share
/// the registry.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: Arc<RwLock<HashMap<String, Arc<InMemoryCache>>>>,
}

impl CacheStorage {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (creating on first use) the cache called `name`.
    pub fn open(&self, name: &str) -> Arc<InMemoryCache> {
        if let Some(cache) = self
            .caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(cache);
        }

        let mut caches = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            caches
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryCache::new(name))),
        )
    }

    /// Whether a cache called `name` has been opened.
    pub fn has(&self, name: &str) -> bool {
        self.caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Drop the cache called `name`.
    pub fn delete(&self, name: &str) -> bool {
        self.caches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Names of the opened caches, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
