//! Error vocabulary shared across crate boundaries (spec.md §7). Each
//! component crate defines its own `thiserror` enum; these are the pieces
//! that show up in more than one of them, so they live here instead of
//! being duplicated or depended on transitively.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressureReason {
    MemoryPressure,
    BufferOverflow,
}

impl std::fmt::Display for BackpressureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackpressureReason::MemoryPressure => write!(f, "memory pressure"),
            BackpressureReason::BufferOverflow => write!(f, "buffer overflow"),
        }
    }
}

/// Carried by `RateLimited` across `autoqa-reliability`, `autoqa-intelligence`,
/// and the orchestrator's HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryAfter(pub Duration);

impl std::fmt::Display for RetryAfter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry after {:.1}s", self.0.as_secs_f64())
    }
}

/// `ProviderError(Transient|Fatal)` classification (spec.md §6, §7): a
/// transient provider error should trigger fallback-once, a fatal one
/// should not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFailureClass {
    Transient,
    Fatal,
}
