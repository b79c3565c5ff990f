//! Artifact metadata (screenshots, DOM snapshots, network logs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Screenshot,
    DomSnapshot,
    NetworkLog,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::DomSnapshot => "html",
            ArtifactKind::NetworkLog => "har",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "Screenshot",
            ArtifactKind::DomSnapshot => "DomSnapshot",
            ArtifactKind::NetworkLog => "NetworkLog",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub kind: ArtifactKind,
    pub timestamp: DateTime<Utc>,
    pub blob_key: String,
    pub size: u64,
    pub metadata: HashMap<String, String>,
}
