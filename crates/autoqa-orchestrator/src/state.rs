//! Wires every component crate together behind the operations the API
//! surface needs: admission, cancellation, status, and the queue stats the
//! dashboard polls. Plays the same "one struct, one Arc, every handler
//! borrows it" role `riptide-api`'s `AppState` plays.

use crate::errors::ApiError;
use autoqa_artifacts::ArtifactCapture;
use autoqa_config::AppConfig;
use autoqa_containers::ContainerManager;
use autoqa_events::SubscriptionBus;
use autoqa_flow::{run_service_loop, EnqueueOutcome, FlowController, FlowMessage};
use autoqa_healing::HealingEngine;
use autoqa_intelligence::{AdmissionGate, ProviderPool, ProviderStatus};
use autoqa_report::{ReportFormat, ReportRenderer};
use autoqa_types::{
    Artifact, ArtifactKind, CancelToken, Channel, ChannelKind, Clock, CollectedResult, Execution,
    ExecutionRequest, ExecutionStatus, Message, Permission,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

/// Broadcast channel every execution-lifecycle event is published on;
/// subscribers filter by `executionId` in their subscription filters
/// rather than one channel per execution (spec.md §4.5 avoids an
/// unbounded channel count).
pub const EXECUTIONS_CHANNEL_NAME: &str = "executions";

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub delayed: usize,
}

struct ExecutionRecord {
    execution: Execution,
    cancel: CancelToken,
    artifacts: Vec<Artifact>,
    total_steps: usize,
    completed_steps: usize,
}

pub struct Orchestrator {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    pub flow: Arc<FlowController<Uuid>>,
    pub containers: Arc<ContainerManager>,
    pub bus: Arc<SubscriptionBus>,
    pub providers: Arc<ProviderPool>,
    pub admission: Arc<AdmissionGate>,
    pub healing: Arc<HealingEngine>,
    pub artifacts: Arc<ArtifactCapture>,
    report_renderer: Arc<ReportRenderer>,
    executions: Mutex<HashMap<Uuid, ExecutionRecord>>,
    executions_channel_id: Uuid,
    completed_count: AtomicU64,
    failed_count: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        flow: Arc<FlowController<Uuid>>,
        containers: Arc<ContainerManager>,
        bus: Arc<SubscriptionBus>,
        providers: Arc<ProviderPool>,
        admission: Arc<AdmissionGate>,
        healing: Arc<HealingEngine>,
        artifacts: Arc<ArtifactCapture>,
        report_renderer: Arc<ReportRenderer>,
    ) -> Self {
        let executions_channel_id = Uuid::new_v4();
        bus.register_channel(Channel::new(
            executions_channel_id,
            EXECUTIONS_CHANNEL_NAME,
            ChannelKind::Public,
        ));
        Self {
            config,
            clock,
            flow,
            containers,
            bus,
            providers,
            admission,
            healing,
            artifacts,
            report_renderer,
            executions: Mutex::new(HashMap::new()),
            executions_channel_id,
            completed_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        }
    }

    pub fn executions_channel_id(&self) -> Uuid {
        self.executions_channel_id
    }

    fn publish(&self, kind: &str, execution_id: Uuid, extra: HashMap<String, serde_json::Value>) {
        let mut content = extra;
        content.insert("executionId".to_string(), serde_json::json!(execution_id));
        self.bus.publish(Message {
            id: Uuid::new_v4(),
            channel_id: self.executions_channel_id,
            sender_id: "orchestrator".to_string(),
            kind: kind.to_string(),
            content,
            timestamp: self.clock.now(),
            required_permissions: None,
        });
    }

    /// Validates, registers, and admits a request onto the flow controller.
    /// On rejection the execution is created in `Cancelled` state so a
    /// caller polling `get_status` sees a terminal, explainable result
    /// rather than a 404 (spec.md §4.10: `Pending -> Cancelled` is legal,
    /// `Pending -> Failed` is not).
    pub fn submit(&self, request: ExecutionRequest) -> Result<Uuid, ApiError> {
        let execution_id = autoqa_types::new_execution_id();
        let now = self.clock.now();
        let priority = request.priority;
        let estimated_size = request.test_code.len() as u64;
        let mut execution = Execution::pending(execution_id, request, now);

        self.publish(
            "execution-submitted",
            execution_id,
            HashMap::from([("priority".to_string(), serde_json::json!(priority))]),
        );

        let outcome = self.flow.enqueue(FlowMessage {
            id: execution_id,
            priority: execution.priority_bucket(),
            size: estimated_size,
            payload: execution_id,
        });

        match outcome {
            EnqueueOutcome::Admitted => {
                self.executions.lock().expect("executions mutex poisoned").insert(
                    execution_id,
                    ExecutionRecord {
                        execution,
                        cancel: CancelToken::new(),
                        artifacts: Vec::new(),
                        total_steps: 0,
                        completed_steps: 0,
                    },
                );
                Ok(execution_id)
            }
            EnqueueOutcome::Rejected(reason) => {
                execution.status = ExecutionStatus::Cancelled;
                execution.ended_at = Some(now);
                self.executions.lock().expect("executions mutex poisoned").insert(
                    execution_id,
                    ExecutionRecord {
                        execution,
                        cancel: CancelToken::new(),
                        artifacts: Vec::new(),
                        total_steps: 0,
                        completed_steps: 0,
                    },
                );
                warn!(%execution_id, %reason, "admission rejected");
                self.publish(
                    "execution-rejected",
                    execution_id,
                    HashMap::from([("reason".to_string(), serde_json::json!(reason.to_string()))]),
                );
                Err(ApiError::QueueRejected(reason))
            }
        }
    }

    /// Idempotent: returns `Ok(true)` the first time an execution actually
    /// transitions to `Cancelled`, `Ok(false)` if it was already terminal.
    pub fn cancel_execution(&self, execution_id: Uuid) -> Result<bool, ApiError> {
        let (status, priority, cancel) = {
            let executions = self.executions.lock().expect("executions mutex poisoned");
            let record = executions
                .get(&execution_id)
                .ok_or(ApiError::NotFound(execution_id))?;
            (
                record.execution.status,
                record.execution.priority_bucket(),
                record.cancel.clone(),
            )
        };

        if status.is_terminal() {
            return Ok(false);
        }

        if status == ExecutionStatus::Pending {
            self.flow.cancel_enqueued(priority, execution_id);
        }
        cancel.cancel();

        let mut executions = self.executions.lock().expect("executions mutex poisoned");
        if let Some(record) = executions.get_mut(&execution_id) {
            if record.execution.status.can_transition_to(ExecutionStatus::Cancelled) {
                record.execution.status = ExecutionStatus::Cancelled;
                record.execution.ended_at = Some(self.clock.now());
            }
        }
        drop(executions);
        self.publish("execution-cancelled", execution_id, HashMap::new());
        Ok(true)
    }

    pub fn get_status(&self, execution_id: Uuid) -> Result<Execution, ApiError> {
        self.executions
            .lock()
            .expect("executions mutex poisoned")
            .get(&execution_id)
            .map(|record| record.execution.clone())
            .ok_or(ApiError::NotFound(execution_id))
    }

    pub fn get_queue_stats(&self) -> QueueStats {
        let executions = self.executions.lock().expect("executions mutex poisoned");
        let active = executions
            .values()
            .filter(|record| record.execution.status == ExecutionStatus::Running)
            .count();
        QueueStats {
            waiting: self.flow.len(),
            active,
            completed: self.completed_count.load(Ordering::Relaxed),
            failed: self.failed_count.load(Ordering::Relaxed),
            delayed: 0,
        }
    }

    pub fn get_provider_status(&self) -> HashMap<String, ProviderStatus> {
        self.providers.status()
    }

    /// Assembles and renders a report for a (typically terminal, but not
    /// required to be) execution. The timeline carries only start/end for
    /// now; richer intermediate events (healing events and similar) flow
    /// in once a caller starts recording them on the execution. Artifacts
    /// and step counts come from what `drive_execution` actually collected
    /// (spec.md:222's per-kind artifact counts), not a placeholder.
    pub fn get_report(&self, execution_id: Uuid, format: ReportFormat) -> Result<Vec<u8>, ApiError> {
        let (execution, artifacts, total_steps, completed_steps) = {
            let executions = self.executions.lock().expect("executions mutex poisoned");
            let record = executions
                .get(&execution_id)
                .ok_or(ApiError::NotFound(execution_id))?;
            (
                record.execution.clone(),
                record.artifacts.clone(),
                record.total_steps,
                record.completed_steps,
            )
        };
        let data = autoqa_report::assemble(&execution, artifacts, Vec::new(), total_steps, completed_steps);
        self.report_renderer
            .render(&data, format)
            .map_err(|err| ApiError::Internal(err.to_string()))
    }

    /// Grants every principal implicit read on the executions channel and
    /// subscribes them; used by the WebSocket handler on connect.
    pub fn subscribe_to_executions(
        &self,
        user_id: impl Into<String>,
        filters: HashMap<String, serde_json::Value>,
    ) -> Result<(autoqa_types::Subscription, mpsc::Receiver<Message>), ApiError> {
        let mut requested = HashSet::new();
        requested.insert(Permission::Read);
        self.bus
            .subscribe(user_id, self.executions_channel_id, requested, filters)
            .map_err(ApiError::from)
    }

    /// Background dispatcher: drains `run_service_loop`'s output, bounded
    /// to `config.concurrency` concurrent executions, and drives each one
    /// to a terminal state. Runs until `shutdown` fires.
    pub async fn run_dispatcher(self: Arc<Self>, shutdown: CancelToken) {
        let (tx, mut rx) = mpsc::channel(self.config.concurrency.max(1));
        let loop_handle = tokio::spawn(run_service_loop(
            self.flow.clone(),
            tx,
            shutdown.clone(),
        ));
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    let permits = permits.clone();
                    let this = self.clone();
                    tokio::spawn(async move {
                        let Ok(permit) = permits.acquire_owned().await else { return };
                        this.drive_execution(message.payload).await;
                        drop(permit);
                    });
                }
            }
        }
        let _ = loop_handle.await;
    }

    async fn drive_execution(&self, execution_id: Uuid) {
        let cancel = {
            let mut executions = self.executions.lock().expect("executions mutex poisoned");
            let Some(record) = executions.get_mut(&execution_id) else {
                return;
            };
            if !record.execution.status.can_transition_to(ExecutionStatus::Running) {
                return;
            }
            record.execution.status = ExecutionStatus::Running;
            record.execution.started_at = Some(self.clock.now());
            record.cancel.clone()
        };
        self.publish("execution-started", execution_id, HashMap::new());

        let request = self.get_status(execution_id).map(|e| e.request.clone());
        let Ok(request) = request else { return };
        let timeout = request.config.timeout;

        let outcome = self.containers.execute_test(timeout, &cancel).await;
        let (final_status, result_ref, container_id, collected_artifacts, step_counts) = match outcome
        {
            Ok(handle) => {
                let collected = self.containers.collect_results(handle.container_id).await;
                match collected {
                    Ok(result) if result.success => {
                        let artifacts = self.collected_into_artifacts(execution_id, &result);
                        let steps = step_counts_for(&result, true);
                        (
                            ExecutionStatus::Completed,
                            Some(result.output),
                            Some(handle.container_id),
                            artifacts,
                            steps,
                        )
                    }
                    Ok(result) => {
                        self.capture_failure_artifacts(&request, execution_id).await;
                        let artifacts = self.collected_into_artifacts(execution_id, &result);
                        let steps = step_counts_for(&result, false);
                        (
                            ExecutionStatus::Failed,
                            Some(result.output),
                            Some(handle.container_id),
                            artifacts,
                            steps,
                        )
                    }
                    Err(err) => {
                        warn!(%execution_id, error = %err, "result collection failed");
                        (
                            ExecutionStatus::Failed,
                            None,
                            Some(handle.container_id),
                            Vec::new(),
                            (0, 0),
                        )
                    }
                }
            }
            Err(autoqa_containers::ContainerError::Cancelled) => {
                info!(%execution_id, "execution cancelled before pod provisioning completed");
                return;
            }
            Err(err) => {
                warn!(%execution_id, error = %err, "container provisioning failed");
                (ExecutionStatus::Failed, None, None, Vec::new(), (0, 0))
            }
        };

        if let Some(container_id) = container_id {
            self.containers.cleanup(container_id).await;
        }

        let mut executions = self.executions.lock().expect("executions mutex poisoned");
        if let Some(record) = executions.get_mut(&execution_id) {
            if record.execution.status.can_transition_to(final_status) {
                record.execution.status = final_status;
                record.execution.ended_at = Some(self.clock.now());
                record.execution.result_ref = result_ref;
            }
            record.artifacts = collected_artifacts;
            record.total_steps = step_counts.0;
            record.completed_steps = step_counts.1;
        }
        drop(executions);

        match final_status {
            ExecutionStatus::Completed => {
                self.completed_count.fetch_add(1, Ordering::Relaxed);
            }
            ExecutionStatus::Failed | ExecutionStatus::TimedOut => {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        self.publish(
            "execution-completed",
            execution_id,
            HashMap::from([("status".to_string(), serde_json::json!(format!("{final_status:?}")))]),
        );
    }

    /// Converts the blob identifiers `ContainerManager::collect_results`
    /// hands back into `Artifact` records the report pipeline can count by
    /// kind (spec.md:222). `CollectedResult` only carries opaque blob keys
    /// and no byte size, so `size` is left at 0 until the runtime reports
    /// one.
    fn collected_into_artifacts(&self, execution_id: Uuid, result: &CollectedResult) -> Vec<Artifact> {
        let timestamp = self.clock.now();
        let screenshots = result
            .screenshots
            .iter()
            .map(|blob_key| self.new_artifact(execution_id, timestamp, ArtifactKind::Screenshot, blob_key));
        let rest = result
            .artifacts
            .iter()
            .map(|blob_key| self.new_artifact(execution_id, timestamp, artifact_kind_for(blob_key), blob_key));
        screenshots.chain(rest).collect()
    }

    fn new_artifact(
        &self,
        execution_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
        kind: ArtifactKind,
        blob_key: &str,
    ) -> Artifact {
        Artifact {
            id: autoqa_types::new_artifact_id(),
            execution_id,
            kind,
            timestamp,
            blob_key: blob_key.to_string(),
            size: 0,
            metadata: HashMap::new(),
        }
    }

    async fn capture_failure_artifacts(&self, request: &ExecutionRequest, execution_id: Uuid) {
        // No live `PageSource` is wired at this layer; a browser-driving
        // caller (the container runtime, out of this crate's scope) would
        // call `ArtifactCapture` directly with its own page handle. This
        // hook exists so the orchestrator's failure path has the seam to
        // call into once that wiring lands.
        let _ = (&self.artifacts, request, execution_id);
    }
}

/// Classifies a generic blob key by its extension, falling back to
/// `DomSnapshot` since that is what `collect_results` mostly gathers beyond
/// screenshots (page source, not network captures).
fn artifact_kind_for(blob_key: &str) -> ArtifactKind {
    if blob_key.ends_with(".har") {
        ArtifactKind::NetworkLog
    } else if blob_key.ends_with(".png") || blob_key.ends_with(".jpg") || blob_key.ends_with(".jpeg") {
        ArtifactKind::Screenshot
    } else {
        ArtifactKind::DomSnapshot
    }
}

/// Derives a step count from what was actually collected, since the
/// container runtime reports artifacts rather than an explicit step log.
/// Every collected screenshot/artifact counts as one completed step; a
/// successful run completes every step it produced, a failed run is
/// treated as one step short (the step that triggered the failure).
fn step_counts_for(result: &CollectedResult, success: bool) -> (usize, usize) {
    let produced = (result.screenshots.len() + result.artifacts.len()).max(1);
    if success {
        (produced, produced)
    } else {
        (produced, produced.saturating_sub(1))
    }
}
