//! Cross-origin security for edge handlers.
//!
//! This crate provides:
//! - `OriginAllowlist` - Exact and pattern-based origin filtering
//! - `apply_cors` - Stamp CORS headers onto a response
//! - `CorsMiddleware` - CORS for every request carrying an `Origin`
//!
//! # Example
//!
//! ```ignore
//! use edge_security::{CorsConfig, CorsMiddleware, OriginAllowlist};
//!
//! let allowlist = OriginAllowlist::new()
//!     .allow_origin("https://app.example.com")
//!     .allow_pattern("https://*.preview.example.com")
//!     .deny_origin("https://stale.preview.example.com");
//!
//! let cors = CorsMiddleware::new(
//!     CorsConfig::new()
//!         .with_origin_check(allowlist)
//!         .with_credentials(true),
//! );
//! ```

mod allowlist;
mod cors;

pub use allowlist::*;
pub use cors::*;
