//! Cache store contract.

use async_trait::async_trait;
use edge_core::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Options for [`CacheStore::match_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Match entries regardless of the lookup request's method.
    #[serde(default)]
    pub ignore_method: bool,
}

impl MatchOptions {
    /// Method-agnostic matching.
    pub fn ignore_method() -> Self {
        Self { ignore_method: true }
    }
}

/// A request-keyed response store.
///
/// This is the one resource shared between events, so implementations
/// must tolerate concurrent `match`/`put` calls. Concurrent puts for the
/// same request resolve as last write wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up the response stored for `request`.
    async fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> CacheResult<Option<Response>>;

    /// Store `response` for `request`.
    async fn put(&self, request: &Request, response: Response) -> CacheResult<()>;
}
