//! # API Shared
//!
//! Shared wire definitions for the Fairway HTTP surface.
//!
//! Contains:
//! - Request and response bodies of the proxy and batch endpoints (`dto` module)
//! - Shared services like `HealthService`
//! - The credential presence check applied to proxy requests
//!
//! Used by `api-rest` and the root `fairway-run` binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
