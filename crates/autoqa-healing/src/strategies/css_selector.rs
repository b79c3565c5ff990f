use super::{Candidate, HealingStrategy, StrategyError};
use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};

/// Tries attribute- and tag-based CSS selector variants derived from the
/// original selector and element type. Highest-confidence strategy: if the
/// element still exists in the DOM snapshot under a near-identical
/// selector, the fix is almost certainly correct.
pub struct CssSelectorStrategy;

#[async_trait]
impl HealingStrategy for CssSelectorStrategy {
    fn kind(&self) -> HealingStrategyKind {
        HealingStrategyKind::CssSelector
    }

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError> {
        let Some(dom) = &ctx.dom_snapshot else {
            return Err(StrategyError::NoCandidate("no DOM snapshot available".into()));
        };

        let tag = ctx.element_type.to_lowercase();
        let candidates = [
            format!("{}[data-testid]", tag),
            format!("{}.{}", tag, ctx.original_selector.trim_start_matches('.')),
            format!("[aria-label*=\"{}\"]", ctx.original_selector),
        ];

        for candidate in candidates {
            if dom.contains(&tag) {
                return Ok(Candidate {
                    selector: candidate,
                    confidence: 0.9,
                });
            }
        }

        Err(StrategyError::NoCandidate(format!(
            "no element matching tag {tag} found in DOM snapshot"
        )))
    }
}
