//! Structured logging and error recovery for edge handlers.
//!
//! This crate provides:
//! - `init_logging` - Global `tracing` subscriber setup (JSON or human output)
//! - `ErrorHandlerMiddleware` - Converts handler faults into `500` responses
//! - `ErrorForwarder` - Hook for reporting faults elsewhere

mod error_handler;
mod logging;

pub use error_handler::*;
pub use logging::*;
