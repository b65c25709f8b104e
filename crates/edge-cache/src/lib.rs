//! Cache-aware response layer for edge handlers.
//!
//! This crate provides:
//! - `CacheStore` - Request-keyed store contract (`match` / `put`)
//! - `CacheStorage` / `InMemoryCache` - Named in-memory caches
//! - `CacheMiddleware` - Cache lookup and population around a handler
//! - `server_timing_entry` - `Server-Timing` metric encoding
//!
//! # Example
//!
//! ```ignore
//! use edge_cache::{CacheConfig, CacheMiddleware, CacheStorage};
//!
//! let storage = CacheStorage::new();
//! let cache = CacheMiddleware::new(
//!     CacheConfig::new(storage.open("pages"))
//!         .with_cache_control("public, max-age=300")
//!         .vary_on("Accept-Language"),
//! );
//! ```

mod error;
mod memory;
mod middleware;
mod store;
mod timing;

pub use error::*;
pub use memory::*;
pub use middleware::*;
pub use store::*;
pub use timing::*;
