pub mod pool;
pub mod providers;

pub use pool::{AdmissionGate, IntelligenceError, ProviderPool, ProviderPoolBuilder, ProviderStatus};
pub use providers::{Provider, ProviderError};
