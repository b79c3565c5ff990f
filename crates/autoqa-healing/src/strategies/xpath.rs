use super::{Candidate, HealingStrategy, StrategyError};
use async_trait::async_trait;
use autoqa_types::{HealingContext, HealingStrategyKind};

/// Falls back to a positional XPath expression when CSS selectors no
/// longer resolve uniquely. Lower confidence than CSS because positional
/// paths are brittle across DOM reshuffles.
pub struct XPathStrategy;

#[async_trait]
impl HealingStrategy for XPathStrategy {
    fn kind(&self) -> HealingStrategyKind {
        HealingStrategyKind::XPath
    }

    async fn attempt(&self, ctx: &HealingContext) -> Result<Candidate, StrategyError> {
        let Some(dom) = &ctx.dom_snapshot else {
            return Err(StrategyError::NoCandidate("no DOM snapshot available".into()));
        };

        let tag = ctx.element_type.to_lowercase();
        if !dom.contains(&tag) {
            return Err(StrategyError::NoCandidate(format!(
                "tag {tag} absent from DOM snapshot"
            )));
        }

        Ok(Candidate {
            selector: format!("//{}[1]", tag),
            confidence: 0.75,
        })
    }
}
