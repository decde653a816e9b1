//! Web search client, rate limiting, and batch execution.
//!
//! This crate provides:
//! - [`SearchProvider`]: the provider seam, with [`GoogleSearchProvider`]
//! - [`RateLimiter`]: request spacing shared by all queries of a run
//! - [`SearchExecutor`]: runs a batch of queries with per-query failure isolation

pub mod executor;
pub mod provider;
pub mod rate_limit;

pub use executor::{BatchOutcome, QueryOutcome, SearchExecutor};
pub use provider::{GoogleSearchProvider, SearchHit, SearchProvider};
pub use rate_limit::{FixedInterval, RateLimiter, Unthrottled};
