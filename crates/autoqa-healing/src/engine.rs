//! Drives the ordered strategy chain, keeping the attempt log and
//! notification emission in lockstep with each strategy's outcome
//! (spec.md §4.7, invariants 5 and 6).

use crate::strategies::{HealingStrategy, StrategyError};
use autoqa_config::HealingConfig;
use autoqa_types::{
    Clock, HealingAttempt, HealingContext, HealingEvent, Notification, NotificationKind,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

pub enum HealOutcome {
    Completed {
        event: HealingEvent,
        notification: Notification,
    },
    InternalError {
        notification: Notification,
    },
}

pub struct HealingEngine {
    user_id: String,
    strategies: Vec<Box<dyn HealingStrategy>>,
    config: HealingConfig,
    clock: Arc<dyn Clock>,
    // Guarantees monotonically increasing event timestamps even when the
    // clock resolution is coarser than the time between calls.
    last_event_millis: Mutex<i64>,
}

impl HealingEngine {
    pub fn new(
        user_id: impl Into<String>,
        strategies: Vec<Box<dyn HealingStrategy>>,
        config: HealingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            strategies,
            config,
            clock,
            last_event_millis: Mutex::new(0),
        }
    }

    fn next_timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        let mut last = self.last_event_millis.lock().expect("mutex poisoned");
        let now = self.clock.now().timestamp_millis();
        let stamped = if now > *last { now } else { *last + 1 };
        *last = stamped;
        chrono::DateTime::from_timestamp_millis(stamped).unwrap_or_else(chrono::Utc::now)
    }

    pub async fn heal(&self, execution_id: Uuid, ctx: &HealingContext) -> HealOutcome {
        if self.strategies.is_empty() {
            let message = "healing engine has no configured strategies".to_string();
            error!(execution_id = %execution_id, "{message}");
            return HealOutcome::InternalError {
                notification: self.system_alert(message),
            };
        }

        let budget = self.config.max_attempts as usize;
        let mut attempts: Vec<HealingAttempt> = Vec::new();
        let mut winner: Option<(&Box<dyn HealingStrategy>, String, f64)> = None;

        for strategy in self.strategies.iter().take(budget) {
            let started = self.clock.monotonic();
            let outcome = strategy.attempt(ctx).await;
            let execution_time_ms = self.clock.monotonic().duration_since(started).as_millis() as u64;

            let attempt = match &outcome {
                Ok(candidate) => HealingAttempt {
                    strategy: strategy.kind(),
                    selector: Some(candidate.selector.clone()),
                    confidence: candidate.confidence,
                    success: true,
                    error: None,
                    execution_time_ms,
                },
                Err(err) => HealingAttempt {
                    strategy: strategy.kind(),
                    selector: None,
                    confidence: 0.0,
                    success: false,
                    error: Some(describe(err)),
                    execution_time_ms,
                },
            };
            // Invariant 5: the attempt reaches the log before the next
            // strategy begins; this loop is sequential so the push below
            // always happens before the next iteration's `attempt` call.
            attempts.push(attempt);

            if let Ok(candidate) = outcome {
                if candidate.confidence >= self.config.confidence_threshold {
                    winner = Some((strategy, candidate.selector, candidate.confidence));
                    break;
                }
            }
        }

        let timestamp = self.next_timestamp();

        if let Some((strategy, new_selector, confidence)) = winner {
            info!(
                execution_id = %execution_id,
                strategy = ?strategy.kind(),
                confidence,
                "self-healing succeeded"
            );
            let event = HealingEvent {
                id: Uuid::new_v4(),
                execution_id,
                old_selector: ctx.original_selector.clone(),
                new_selector: Some(new_selector.clone()),
                winning_strategy: Some(strategy.kind()),
                success: true,
                confidence,
                attempts: attempts.clone(),
                timestamp,
            };
            let notification = Notification::new(
                Uuid::new_v4(),
                self.user_id.clone(),
                NotificationKind::HealingEvent,
                "Self-Healing Success",
                format!(
                    "Recovered selector for execution {execution_id} using {:?}",
                    strategy.kind()
                ),
                [
                    ("oldSelector".to_string(), json!(ctx.original_selector)),
                    ("newSelector".to_string(), json!(new_selector)),
                    ("strategy".to_string(), json!(format!("{:?}", strategy.kind()))),
                    ("confidence".to_string(), json!(confidence)),
                    ("attemptsCount".to_string(), json!(attempts.len())),
                ]
                .into_iter()
                .collect(),
                timestamp,
            );
            HealOutcome::Completed { event, notification }
        } else {
            warn!(
                execution_id = %execution_id,
                attempts = attempts.len(),
                "self-healing exhausted all strategies without success"
            );
            let total_execution_time_ms: u64 = attempts.iter().map(|a| a.execution_time_ms).sum();
            let strategies_tried: Vec<String> = attempts
                .iter()
                .map(|a| format!("{:?}", a.strategy))
                .collect();
            let event = HealingEvent {
                id: Uuid::new_v4(),
                execution_id,
                old_selector: ctx.original_selector.clone(),
                new_selector: None,
                winning_strategy: None,
                success: false,
                confidence: 0.0,
                attempts: attempts.clone(),
                timestamp,
            };
            let notification = Notification::new(
                Uuid::new_v4(),
                self.user_id.clone(),
                NotificationKind::HealingEvent,
                "Self-Healing Failed",
                format!("All healing strategies failed for execution {execution_id}"),
                [
                    ("strategiesTried".to_string(), json!(strategies_tried)),
                    ("attemptsCount".to_string(), json!(attempts.len())),
                    ("totalExecutionTime".to_string(), json!(total_execution_time_ms)),
                ]
                .into_iter()
                .collect(),
                timestamp,
            );
            HealOutcome::Completed { event, notification }
        }
    }

    fn system_alert(&self, message: String) -> Notification {
        Notification::new(
            Uuid::new_v4(),
            self.user_id.clone(),
            NotificationKind::SystemAlert,
            "Healing Engine Error",
            message,
            Default::default(),
            self.clock.now(),
        )
    }
}

fn describe(err: &StrategyError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::Candidate;
    use async_trait::async_trait;
    use autoqa_types::{HealingStrategyKind, LastKnownLocation, ManualClock};
    use std::collections::HashMap;

    struct FixedStrategy {
        kind: HealingStrategyKind,
        result: Result<Candidate, StrategyError>,
    }

    #[async_trait]
    impl HealingStrategy for FixedStrategy {
        fn kind(&self) -> HealingStrategyKind {
            self.kind
        }

        async fn attempt(&self, _ctx: &HealingContext) -> Result<Candidate, StrategyError> {
            self.result.clone()
        }
    }

    fn ctx() -> HealingContext {
        HealingContext {
            original_selector: "#submit".into(),
            element_type: "button".into(),
            last_known_location: Some(LastKnownLocation {
                x: Some(10.0),
                y: Some(20.0),
                visual_hash: Some("abc123".into()),
            }),
            dom_snapshot: Some("<button>Submit</button>".into()),
            screenshot: None,
            extra: HashMap::new(),
        }
    }

    fn config(max_attempts: u32, threshold: f64) -> HealingConfig {
        HealingConfig {
            max_attempts,
            confidence_threshold: threshold,
        }
    }

    #[tokio::test]
    async fn second_strategy_wins_after_first_fails() {
        let strategies: Vec<Box<dyn HealingStrategy>> = vec![
            Box::new(FixedStrategy {
                kind: HealingStrategyKind::CssSelector,
                result: Err(StrategyError::NoCandidate("gone".into())),
            }),
            Box::new(FixedStrategy {
                kind: HealingStrategyKind::XPath,
                result: Ok(Candidate {
                    selector: "//button[1]".into(),
                    confidence: 0.8,
                }),
            }),
        ];
        let engine = HealingEngine::new(
            "user-1",
            strategies,
            config(5, 0.7),
            ManualClock::new(chrono::Utc::now()),
        );

        match engine.heal(Uuid::new_v4(), &ctx()).await {
            HealOutcome::Completed { event, notification } => {
                assert!(event.success);
                assert_eq!(event.winning_strategy, Some(HealingStrategyKind::XPath));
                assert_eq!(event.attempts.len(), 2);
                assert_eq!(notification.title, "Self-Healing Success");
            }
            HealOutcome::InternalError { .. } => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn all_strategies_failing_emits_failure_event() {
        let strategies: Vec<Box<dyn HealingStrategy>> = vec![Box::new(FixedStrategy {
            kind: HealingStrategyKind::CssSelector,
            result: Err(StrategyError::NoCandidate("gone".into())),
        })];
        let engine = HealingEngine::new(
            "user-1",
            strategies,
            config(5, 0.7),
            ManualClock::new(chrono::Utc::now()),
        );

        match engine.heal(Uuid::new_v4(), &ctx()).await {
            HealOutcome::Completed { event, notification } => {
                assert!(!event.success);
                assert!(event.winning_strategy.is_none());
                assert_eq!(notification.title, "Self-Healing Failed");
            }
            HealOutcome::InternalError { .. } => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn low_confidence_candidate_does_not_win() {
        let strategies: Vec<Box<dyn HealingStrategy>> = vec![Box::new(FixedStrategy {
            kind: HealingStrategyKind::CssSelector,
            result: Ok(Candidate {
                selector: "button.maybe".into(),
                confidence: 0.2,
            }),
        })];
        let engine = HealingEngine::new(
            "user-1",
            strategies,
            config(5, 0.7),
            ManualClock::new(chrono::Utc::now()),
        );

        match engine.heal(Uuid::new_v4(), &ctx()).await {
            HealOutcome::Completed { event, .. } => {
                assert!(!event.success);
                assert_eq!(event.attempts.len(), 1);
                assert!(event.attempts[0].success);
            }
            HealOutcome::InternalError { .. } => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn empty_strategy_chain_raises_internal_error() {
        let engine = HealingEngine::new(
            "user-1",
            Vec::new(),
            config(5, 0.7),
            ManualClock::new(chrono::Utc::now()),
        );

        match engine.heal(Uuid::new_v4(), &ctx()).await {
            HealOutcome::InternalError { notification } => {
                assert_eq!(notification.title, "Healing Engine Error");
            }
            HealOutcome::Completed { .. } => panic!("expected internal error"),
        }
    }
}
