//! Token bucket rate limiting and circuit breaking shared by every
//! component that calls out to a Provider, BlobStore, or BrowserRuntime.

pub mod circuit_breaker;
pub mod presets;
pub mod token_bucket;

pub use circuit_breaker::{BreakerError, BreakerState, CircuitBreaker};
pub use token_bucket::{DualBucket, RateLimited, TokenBucket};
