//! Public SDK for composing edge handler middleware.
//!
//! This crate re-exports all platform functionality:
//!
//! ```ignore
//! use edge_sdk::prelude::*;
//!
//! let storage = CacheStorage::new();
//! let pipeline = PipelineConfig::load("edge.toml")?.build(&storage)?;
//!
//! let router = EventHandler::new(|event: &FetchEvent| {
//!     (event.request().url().path() == "/").then(|| {
//!         RouteMatch::new(handler_fn(|_ctx| async { Ok(Response::ok("ok")) }))
//!     })
//! })
//! .originless(true)
//! .with_pipeline(pipeline);
//!
//! let Dispatched { response, pending } = router.handle(FetchEvent::new(request)).await?;
//! pending.settle().await?;
//! ```

mod config;
mod middleware;

pub use config::*;
pub use middleware::*;

pub use edge_cache;
pub use edge_core;
pub use edge_observability;
pub use edge_rewrite;
pub use edge_security;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{ConfigError, EdgeMiddleware, MiddlewareSettings, PipelineConfig};
    pub use edge_cache::*;
    pub use edge_core::*;
    pub use edge_observability::*;
    pub use edge_rewrite::*;
    pub use edge_security::*;
}
