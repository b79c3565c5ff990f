//! Shared domain types, clock, and cancellation primitives for the AutoQA
//! control plane. Every other `autoqa-*` crate depends on this one and
//! none of its siblings, so it stays free of anything that would create a
//! cycle (see `flow::Priority` for the pattern this follows).

pub mod artifact;
pub mod cancel;
pub mod channel;
pub mod clock;
pub mod container;
pub mod errors;
pub mod execution;
pub mod flow;
pub mod healing;
pub mod ids;
pub mod notification;
pub mod provider;

pub use artifact::{Artifact, ArtifactKind};
pub use cancel::CancelToken;
pub use channel::{Channel, ChannelKind, Message, Permission, Subscription};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use container::{
    CollectedResult, ContainerHandle, ContainerMetrics, ContainerStatus, EgressPolicy, PodSpec,
    ResourceCaps,
};
pub use errors::{BackpressureReason, ProviderFailureClass, RetryAfter};
pub use execution::{
    BrowserKind, Execution, ExecutionConfig, ExecutionMetrics, ExecutionRequest, ExecutionStatus,
    RequestValidationError, Viewport,
};
pub use flow::Priority;
pub use healing::{
    HealingAttempt, HealingContext, HealingEvent, HealingStrategyKind, LastKnownLocation,
};
pub use ids::{artifact_key, new_artifact_id, new_container_id, new_execution_id, new_pod_name};
pub use notification::{Notification, NotificationKind};
pub use provider::{GenerationResult, ProviderOptions, ProviderRequest, ValidationResult};
