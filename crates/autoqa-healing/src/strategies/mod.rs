//! Individual healing strategies, in the shape of `riptide-extraction`'s
//! strategy trait: an async, named, self-describing unit that either
//! produces a candidate with a confidence score or declares it cannot
//! handle the input.

mod css_selector;
mod structural_analysis;
mod text_content;
mod visual_recognition;
mod xpath;

pub use css_selector::CssSelectorStrategy;
pub use structural_analysis::StructuralAnalysisStrategy;
pub use text_content::TextContentStrategy;
pub use visual_recognition::VisualRecognitionStrategy;
pub use xpath::XPathStrategy;

use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StrategyError {
    #[error("insufficient visual data to attempt recognition")]
    InsufficientVisualData,
    #[error("strategy could not locate a candidate: {0}")]
    NoCandidate(String),
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub selector: String,
    pub confidence: f64,
}

#[async_trait]
pub trait HealingStrategy: Send + Sync {
    fn kind(&self) -> HealingStrategyKind;

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError>;
}

/// The default ordered chain (spec.md §4.7).
pub fn default_chain() -> Vec<Box<dyn HealingStrategy>> {
    vec![
        Box::new(CssSelectorStrategy),
        Box::new(XPathStrategy),
        Box::new(TextContentStrategy),
        Box::new(VisualRecognitionStrategy),
        Box::new(StructuralAnalysisStrategy),
    ]
}
