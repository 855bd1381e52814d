//! `PageFetcher` implementations.

pub mod http;
pub mod rate_limited;

pub use http::HttpFetcher;
pub use rate_limited::{RateLimitExt, RateLimitedFetcher};
