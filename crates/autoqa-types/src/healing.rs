//! Healing strategy inputs/outputs (spec.md §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealingStrategyKind {
    CssSelector,
    XPath,
    TextContent,
    VisualRecognition,
    StructuralAnalysis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastKnownLocation {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub visual_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingContext {
    pub original_selector: String,
    pub element_type: String,
    pub last_known_location: Option<LastKnownLocation>,
    pub dom_snapshot: Option<String>,
    pub screenshot: Option<Vec<u8>>,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAttempt {
    pub strategy: HealingStrategyKind,
    pub selector: Option<String>,
    pub confidence: f64,
    pub success: bool,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingEvent {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub old_selector: String,
    pub new_selector: Option<String>,
    pub winning_strategy: Option<HealingStrategyKind>,
    pub success: bool,
    pub confidence: f64,
    pub attempts: Vec<HealingAttempt>,
    pub timestamp: DateTime<Utc>,
}
