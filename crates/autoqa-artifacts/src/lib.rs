pub mod blob_store;
pub mod capture;
pub mod har;

pub use blob_store::{BlobError, BlobStore, InMemoryBlobStore};
pub use capture::{ArtifactCapture, CaptureAllResult, CaptureConfig, PageError, PageSource};
pub use har::{to_har, HarLog, NetworkLogEntry};
