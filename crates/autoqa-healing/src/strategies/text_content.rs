use super::{Candidate, HealingStrategy, StrategyError};
use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};

/// Locates the element by its visible text, when `extra["expectedText"]`
/// was recorded at capture time. Moderate confidence: text content is
/// stable across markup changes but not unique on every page.
pub struct TextContentStrategy;

#[async_trait]
impl HealingStrategy for TextContentStrategy {
    fn kind(&self) -> HealingStrategyKind {
        HealingStrategyKind::TextContent
    }

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError> {
        let Some(expected_text) = ctx.extra.get("expectedText") else {
            return Err(StrategyError::NoCandidate(
                "no expected text recorded for this element".into(),
            ));
        };
        let Some(dom) = &ctx.dom_snapshot else {
            return Err(StrategyError::NoCandidate("no DOM snapshot available".into()));
        };

        if !dom.contains(expected_text.as_str()) {
            return Err(StrategyError::NoCandidate(format!(
                "expected text {expected_text:?} not found in DOM snapshot"
            )));
        }

        Ok(Candidate {
            selector: format!("text={expected_text}"),
            confidence: 0.6,
        })
    }
}
