//! Composes screenshot, DOM, and network capture into uploaded artifacts
//! (spec.md §4.8). Capture failures are swallowed here by design: a flaky
//! screenshot must never fail the test it was taken of.

use crate::blob_store::BlobStore;
use crate::har::{to_har, NetworkLogEntry};
use async_trait::async_trait;
use autoqa_types::{artifact_key, new_artifact_id, Artifact, ArtifactKind, Clock, Viewport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("page source error: {0}")]
    Source(String),
}

/// Abstraction over whatever drives the browser, so capture logic doesn't
/// depend on a concrete automation crate.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn screenshot_png(&self) -> Result<Vec<u8>, PageError>;
    async fn html(&self) -> Result<String, PageError>;
    fn viewport(&self) -> Option<Viewport>;
}

pub struct CaptureConfig {
    pub compress_screenshots: bool,
    pub compress_dom: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            compress_screenshots: true,
            compress_dom: true,
        }
    }
}

pub struct CaptureAllResult {
    pub success: bool,
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<String>,
}

pub struct ArtifactCapture {
    blob_store: Arc<dyn BlobStore>,
    config: CaptureConfig,
    clock: Arc<dyn Clock>,
    network_log: Mutex<Vec<NetworkLogEntry>>,
}

impl ArtifactCapture {
    pub fn new(blob_store: Arc<dyn BlobStore>, config: CaptureConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            blob_store,
            config,
            clock,
            network_log: Mutex::new(Vec::new()),
        }
    }

    pub async fn capture_screenshot(
        &self,
        page: &dyn PageSource,
        test_id: &str,
        execution_id: Uuid,
        step_name: &str,
    ) -> Option<Artifact> {
        let bytes = match page.screenshot_png().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(execution_id = %execution_id, step_name, error = %err, "screenshot capture failed");
                return None;
            }
        };

        let bytes = if self.config.compress_screenshots {
            recompress_png_stub(bytes)
        } else {
            bytes
        };

        let viewport = page.viewport().unwrap_or(Viewport {
            width: 1920,
            height: 1080,
        });

        let mut metadata = HashMap::new();
        metadata.insert("stepName".to_string(), step_name.to_string());
        metadata.insert("viewport".to_string(), format!("{}x{}", viewport.width, viewport.height));

        match self
            .upload(test_id, execution_id, ArtifactKind::Screenshot, bytes, metadata)
            .await
        {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "screenshot upload failed");
                None
            }
        }
    }

    pub async fn capture_dom_snapshot(
        &self,
        page: &dyn PageSource,
        test_id: &str,
        execution_id: Uuid,
        error: Option<&str>,
    ) -> Option<Artifact> {
        let html = match page.html().await {
            Ok(html) => html,
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "DOM capture failed");
                return None;
            }
        };

        let html = if self.config.compress_dom {
            collapse_whitespace(&html)
        } else {
            html
        };

        let mut metadata = HashMap::new();
        if let Some(error) = error {
            metadata.insert("error".to_string(), error.to_string());
        }

        match self
            .upload(
                test_id,
                execution_id,
                ArtifactKind::DomSnapshot,
                html.into_bytes(),
                metadata,
            )
            .await
        {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "DOM upload failed");
                None
            }
        }
    }

    /// Appends a completed request/response pair to the in-memory network
    /// log, to be flushed by `capture_network_logs`.
    pub fn record_network_entry(&self, entry: NetworkLogEntry) {
        self.network_log
            .lock()
            .expect("network log mutex poisoned")
            .push(entry);
    }

    pub async fn capture_network_logs(&self, test_id: &str, execution_id: Uuid) -> Option<Artifact> {
        let entries = self
            .network_log
            .lock()
            .expect("network log mutex poisoned")
            .clone();
        let har = to_har(&entries);
        let bytes = match serde_json::to_vec_pretty(&har) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "HAR serialization failed");
                return None;
            }
        };

        match self
            .upload(
                test_id,
                execution_id,
                ArtifactKind::NetworkLog,
                bytes,
                HashMap::new(),
            )
            .await
        {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "network log upload failed");
                None
            }
        }
    }

    pub async fn capture_all(
        &self,
        page: &dyn PageSource,
        test_id: &str,
        execution_id: Uuid,
        step_name: &str,
        error: Option<&str>,
    ) -> CaptureAllResult {
        let mut artifacts = Vec::new();
        let mut errors = Vec::new();

        match self
            .capture_screenshot(page, test_id, execution_id, step_name)
            .await
        {
            Some(artifact) => artifacts.push(artifact),
            None => errors.push("screenshot capture failed or was skipped".to_string()),
        }

        match self.capture_dom_snapshot(page, test_id, execution_id, error).await {
            Some(artifact) => artifacts.push(artifact),
            None => errors.push("DOM snapshot capture failed or was skipped".to_string()),
        }

        match self.capture_network_logs(test_id, execution_id).await {
            Some(artifact) => artifacts.push(artifact),
            None => errors.push("network log capture failed or was skipped".to_string()),
        }

        CaptureAllResult {
            success: !artifacts.is_empty(),
            artifacts,
            errors,
        }
    }

    /// Lists and deletes every artifact under `testId/executionId`. Partial
    /// failures are reported but never undo earlier deletions.
    pub async fn delete_artifacts(
        &self,
        test_id: &str,
        execution_id: Uuid,
    ) -> Result<Vec<String>, Vec<(String, crate::blob_store::BlobError)>> {
        let prefix = format!("artifacts/{test_id}/{execution_id}/");
        self.blob_store.delete_prefix(&prefix).await
    }

    async fn upload(
        &self,
        test_id: &str,
        execution_id: Uuid,
        kind: ArtifactKind,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<Artifact, crate::blob_store::BlobError> {
        let timestamp = self.clock.now();
        let key = artifact_key(
            test_id,
            execution_id,
            kind.label(),
            timestamp.timestamp_millis(),
            kind.extension(),
        );
        let size = bytes.len() as u64;
        self.blob_store.upload(&key, bytes).await?;
        Ok(Artifact {
            id: new_artifact_id(),
            execution_id,
            kind,
            timestamp,
            blob_key: key,
            size,
            metadata,
        })
    }
}

/// Placeholder recompression: a real implementation would re-encode at
/// quality ~80 through an image crate. Kept as a seam so swapping in a
/// real encoder doesn't change any call site.
fn recompress_png_stub(bytes: Vec<u8>) -> Vec<u8> {
    bytes
}

fn collapse_whitespace(html: &str) -> String {
    let mut collapsed = String::with_capacity(html.len());
    let mut last_was_space = false;
    for ch in html.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(ch);
            last_was_space = false;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::InMemoryBlobStore;
    use autoqa_types::SystemClock;

    struct FakePage {
        png: Vec<u8>,
        html: String,
    }

    #[async_trait]
    impl PageSource for FakePage {
        async fn screenshot_png(&self) -> Result<Vec<u8>, PageError> {
            Ok(self.png.clone())
        }

        async fn html(&self) -> Result<String, PageError> {
            Ok(self.html.clone())
        }

        fn viewport(&self) -> Option<Viewport> {
            None
        }
    }

    struct FailingPage;

    #[async_trait]
    impl PageSource for FailingPage {
        async fn screenshot_png(&self) -> Result<Vec<u8>, PageError> {
            Err(PageError::Source("disconnected".into()))
        }

        async fn html(&self) -> Result<String, PageError> {
            Err(PageError::Source("disconnected".into()))
        }

        fn viewport(&self) -> Option<Viewport> {
            None
        }
    }

    fn capture() -> ArtifactCapture {
        ArtifactCapture::new(
            Arc::new(InMemoryBlobStore::new()),
            CaptureConfig::default(),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn screenshot_capture_falls_back_to_default_viewport() {
        let capture = capture();
        let page = FakePage {
            png: vec![0x89, b'P', b'N', b'G'],
            html: "<html></html>".into(),
        };
        let artifact = capture
            .capture_screenshot(&page, "t1", Uuid::new_v4(), "login")
            .await
            .unwrap();
        assert_eq!(artifact.metadata["viewport"], "1920x1080");
    }

    #[tokio::test]
    async fn capture_failure_is_swallowed_not_propagated() {
        let capture = capture();
        let page = FailingPage;
        let result = capture
            .capture_screenshot(&page, "t1", Uuid::new_v4(), "login")
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn capture_all_reports_partial_failure_without_panicking() {
        let capture = capture();
        let page = FailingPage;
        let result = capture
            .capture_all(&page, "t1", Uuid::new_v4(), "login", Some("boom"))
            .await;
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn delete_artifacts_removes_every_uploaded_blob() {
        let capture = capture();
        let page = FakePage {
            png: vec![1, 2, 3],
            html: "<html></html>".into(),
        };
        let execution_id = Uuid::new_v4();
        capture
            .capture_screenshot(&page, "t1", execution_id, "login")
            .await
            .unwrap();
        capture
            .capture_dom_snapshot(&page, "t1", execution_id, None)
            .await
            .unwrap();

        let deleted = capture.delete_artifacts("t1", execution_id).await.unwrap();
        assert_eq!(deleted.len(), 2);
    }
}
