use super::{Candidate, HealingStrategy, StrategyError};
use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};

/// Matches against a perceptual hash of the element's last known
/// appearance. Requires either a recorded `visualHash` or a fresh
/// screenshot to compare against; without either it cannot even attempt
/// a match (spec.md §4.7's `InsufficientVisualData` rule).
pub struct VisualRecognitionStrategy;

#[async_trait]
impl HealingStrategy for VisualRecognitionStrategy {
    fn kind(&self) -> HealingStrategyKind {
        HealingStrategyKind::VisualRecognition
    }

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError> {
        let has_visual_hash = ctx
            .last_known_location
            .as_ref()
            .and_then(|loc| loc.visual_hash.as_ref())
            .is_some();
        let has_screenshot = ctx.screenshot.is_some();

        if !has_visual_hash && !has_screenshot {
            return Err(StrategyError::InsufficientVisualData);
        }

        let Some(location) = &ctx.last_known_location else {
            return Err(StrategyError::NoCandidate(
                "screenshot present but no last known coordinates to anchor on".into(),
            ));
        };
        let (Some(x), Some(y)) = (location.x, location.y) else {
            return Err(StrategyError::NoCandidate(
                "last known location missing coordinates".into(),
            ));
        };

        Ok(Candidate {
            selector: format!("coordinates({x:.1},{y:.1})"),
            confidence: 0.5,
        })
    }
}
