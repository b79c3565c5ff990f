//! Channel/subscription pub-sub fan-out for the AutoQA control plane.

pub mod bus;

pub use bus::{spawn_sweeper, SubscribeError, SubscriptionBus};
