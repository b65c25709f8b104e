//! Core abstractions for composable edge request handlers.
//!
//! This crate provides the fundamental types and traits:
//! - `Request` / `Response` / `Headers` - Immutable HTTP model
//! - `Handler` / `Middleware` / `Pipeline` - Handler contract and composition
//! - `manage_headers` - Header merge engine
//! - `FetchEvent` / `PendingTasks` - Event lifetime and background work
//! - `EventHandler` - Top-level dispatcher

mod context;
mod dispatch;
mod error;
mod event;
mod handler;
mod headers;
mod merge;
mod request;
mod response;

pub use context::*;
pub use dispatch::*;
pub use error::*;
pub use event::*;
pub use handler::*;
pub use headers::*;
pub use merge::*;
pub use request::*;
pub use response::*;

pub use bytes::Bytes;
pub use http::{Method, StatusCode};
pub use url::Url;
