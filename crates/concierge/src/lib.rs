//! Concierge: semantic lookup and precomputed analytics over hotel bookings.
//!
//! Offline, [`builder::IndexBuilder`] turns a booking CSV into an aligned
//! snapshot and vector index, and [`analytics::AnalyticsCacheBuilder`]
//! precomputes the aggregate views. Online, [`context::AppContext`] loads those
//! artifacts once and answers questions through [`resolver::QueryResolver`] and
//! [`analytics::AnalyticsServer`].

pub mod analytics;
pub mod builder;
pub mod cli;
pub mod config;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod history;
pub mod index;
pub mod persist;
pub mod records;
pub mod resolver;
pub mod server;

pub use error::{ConciergeError, Result};
