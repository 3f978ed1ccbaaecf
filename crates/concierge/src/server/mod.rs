//! REST API for the booking concierge.
//!
//! A thin axum layer over [`crate::context::AppContext`]: every handler
//! delegates to the context and maps its typed errors onto HTTP responses.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod startup;
pub mod types;
