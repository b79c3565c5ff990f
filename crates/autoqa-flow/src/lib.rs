//! Priority-queue backpressure controller admitting work into the
//! control plane.

pub mod controller;

pub use controller::{
    run_service_loop, EnqueueOutcome, FlowController, FlowMessage, FlowSignal,
};
