//! Two independent rate limiting strategies, both built on
//! `cache::CloneCache` to avoid a global lock on the hot path:
//!
//! - [`auth`]: failure-only IP rate limiting, for auth endpoints.
//!   Succeeding requests never consume budget; only failed attempts
//!   (bad password, bad api secret, expired jwt) do.
//! - [`bucket`]: a per-`(user, command class)` token bucket, for the
//!   command executor. Every admission attempt consumes a token
//!   whether it succeeds or not.

pub mod auth;
pub mod bucket;

pub use auth::{RateLimiter, WithFailureRateLimit, get_ip_from_headers};
pub use bucket::{BucketRateLimiter, BucketStatus};
