pub mod engine;
pub mod strategies;

pub use engine::{HealOutcome, HealingEngine};
pub use strategies::{default_chain, Candidate, HealingStrategy, StrategyError};
