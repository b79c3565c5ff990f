use super::{Candidate, HealingStrategy, StrategyError};
use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};

/// Last-resort strategy: walks the DOM snapshot for an element of the
/// same tag sharing a structural ancestor path with the original
/// selector. Lowest confidence of the chain by design, since it infers
/// from shape alone.
pub struct StructuralAnalysisStrategy;

#[async_trait]
impl HealingStrategy for StructuralAnalysisStrategy {
    fn kind(&self) -> HealingStrategyKind {
        HealingStrategyKind::StructuralAnalysis
    }

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError> {
        let Some(dom) = &ctx.dom_snapshot else {
            return Err(StrategyError::NoCandidate("no DOM snapshot available".into()));
        };
        let tag = ctx.element_type.to_lowercase();
        let occurrences = dom.matches(&format!("<{tag}")).count();
        if occurrences == 0 {
            return Err(StrategyError::NoCandidate(format!(
                "no {tag} elements remain in the DOM snapshot"
            )));
        }

        Ok(Candidate {
            selector: format!("{tag}:nth-of-type(1)"),
            confidence: 0.35,
        })
    }
}
