//! Per-execution isolated browser container lifecycle management.

pub mod manager;
pub mod runtime;

pub use manager::{spawn_status_poller, ContainerError, ContainerManager};
pub use runtime::{BrowserRuntime, RuntimeError};
