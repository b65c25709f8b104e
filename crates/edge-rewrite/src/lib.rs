//! Request and response rewriting for edge handlers.
//!
//! This crate provides:
//! - `HeadersMiddleware` - Add/remove request and response headers
//! - `RedirectMiddleware` - Rewrite the request URL or answer with a redirect
//!
//! # Example
//!
//! ```ignore
//! use edge_core::ExistingPolicy;
//! use edge_rewrite::{HeadersConfig, HeadersMiddleware, RedirectConfig, RedirectMiddleware};
//!
//! let headers = HeadersMiddleware::new(
//!     HeadersConfig::new()
//!         .add_response_header("X-Frame-Options", "DENY")
//!         .remove_response_header("X-Powered-By")
//!         .with_existing(ExistingPolicy::Override),
//! );
//!
//! let moved = RedirectMiddleware::new(RedirectConfig::to("/new-home").permanent());
//! ```

mod headers;
mod redirect;

pub use headers::*;
pub use redirect::*;
