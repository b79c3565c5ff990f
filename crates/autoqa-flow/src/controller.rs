//! Three-queue backpressure controller (spec.md §4.4), in the shape of
//! `riptide-workers`'s semaphore-based `BackpressureController`. The
//! resource being rationed here is queue bytes/slots rather than
//! concurrent permits, so admission is a synchronous accounting decision
//! instead of a semaphore acquire, but the watermark/signal vocabulary
//! (slow_down, resume, pause) is the same shape.

use autoqa_config::FlowControllerConfig;
use autoqa_types::{BackpressureReason, Clock, Priority};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

/// Oldest-normal-messages dropped on a buffer overflow, per spec.md §4.4.
const OVERFLOW_DROP_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct FlowMessage<T> {
    pub id: Uuid,
    pub priority: Priority,
    pub size: u64,
    pub payload: T,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowSignal {
    SlowDown,
    Resume,
    DropMessages { utilization: f64 },
    Pause { utilization: f64 },
    SlowConsumerDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Admitted,
    Rejected(BackpressureReason),
}

struct Queues<T> {
    high: VecDeque<FlowMessage<T>>,
    normal: VecDeque<FlowMessage<T>>,
    low: VecDeque<FlowMessage<T>>,
}

impl<T> Queues<T> {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    fn queue_mut(&mut self, priority: Priority) -> &mut VecDeque<FlowMessage<T>> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}

struct Inner<T> {
    queues: Queues<T>,
    current_bytes: u64,
    backpressure_active: bool,
    last_pop: Instant,
}

pub struct FlowController<T> {
    inner: Mutex<Inner<T>>,
    config: FlowControllerConfig,
    clock: std::sync::Arc<dyn Clock>,
    signals: broadcast::Sender<FlowSignal>,
}

impl<T> FlowController<T> {
    pub fn new(config: FlowControllerConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        let (signals, _rx) = broadcast::channel(128);
        Self {
            inner: Mutex::new(Inner {
                queues: Queues::new(),
                current_bytes: 0,
                backpressure_active: false,
                last_pop: clock.monotonic(),
            }),
            config,
            clock,
            signals,
        }
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<FlowSignal> {
        self.signals.subscribe()
    }

    fn emit(&self, signal: FlowSignal) {
        let _ = self.signals.send(signal);
    }

    pub fn current_bytes(&self) -> u64 {
        self.inner.lock().expect("flow mutex poisoned").current_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("flow mutex poisoned").queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn byte_utilization(current_bytes: u64, cap: u64) -> f64 {
        if cap == 0 {
            1.0
        } else {
            current_bytes as f64 / cap as f64
        }
    }

    fn reevaluate_watermarks(&self, inner: &mut Inner<T>) {
        let utilization = Self::byte_utilization(inner.current_bytes, self.config.max_memory_usage);
        if utilization >= self.config.high_water_mark_pct && !inner.backpressure_active {
            inner.backpressure_active = true;
            self.emit(FlowSignal::SlowDown);
        } else if utilization <= self.config.low_water_mark_pct && inner.backpressure_active {
            inner.backpressure_active = false;
            self.emit(FlowSignal::Resume);
        }
    }

    pub fn enqueue(&self, message: FlowMessage<T>) -> EnqueueOutcome {
        let mut inner = self.inner.lock().expect("flow mutex poisoned");

        if inner.current_bytes + message.size > self.config.max_memory_usage {
            let freed: u64 = inner.queues.low.iter().map(|m| m.size).sum();
            inner.current_bytes = inner.current_bytes.saturating_sub(freed);
            inner.queues.low.clear();
            let utilization =
                Self::byte_utilization(inner.current_bytes, self.config.max_memory_usage);
            warn!(utilization, "memory pressure: dropped all low priority messages");
            self.emit(FlowSignal::DropMessages { utilization });
            return EnqueueOutcome::Rejected(BackpressureReason::MemoryPressure);
        }

        if inner.queues.len() >= self.config.max_buffer_size {
            let drop_count = inner.queues.normal.len().min(OVERFLOW_DROP_BATCH);
            let mut freed = 0u64;
            for _ in 0..drop_count {
                if let Some(dropped) = inner.queues.normal.pop_front() {
                    freed += dropped.size;
                }
            }
            inner.current_bytes = inner.current_bytes.saturating_sub(freed);
            let utilization = inner.queues.len() as f64 / self.config.max_buffer_size as f64;
            warn!(dropped = drop_count, "buffer overflow: dropped oldest normal messages");
            self.emit(FlowSignal::Pause { utilization });
            return EnqueueOutcome::Rejected(BackpressureReason::BufferOverflow);
        }

        inner.current_bytes += message.size;
        inner.queues.queue_mut(message.priority).push_back(message);
        self.reevaluate_watermarks(&mut inner);
        EnqueueOutcome::Admitted
    }

    /// Removes a still-queued message (by id, within its declared
    /// priority) and re-credits its bytes. Used when an admitted
    /// Execution is cancelled before the service loop reaches it
    /// (spec.md §5).
    pub fn cancel_enqueued(&self, priority: Priority, message_id: Uuid) -> bool {
        let mut inner = self.inner.lock().expect("flow mutex poisoned");
        let queue = inner.queues.queue_mut(priority);
        if let Some(pos) = queue.iter().position(|m| m.id == message_id) {
            let removed = queue.remove(pos).expect("position just located");
            inner.current_bytes = inner.current_bytes.saturating_sub(removed.size);
            self.reevaluate_watermarks(&mut inner);
            true
        } else {
            false
        }
    }

    /// Pops the next message in priority order `high > normal > low`.
    pub fn pop(&self) -> Option<FlowMessage<T>> {
        let mut inner = self.inner.lock().expect("flow mutex poisoned");

        let now = self.clock.monotonic();
        if now.saturating_duration_since(inner.last_pop) > self.config.slow_consumer_threshold
            && inner.queues.len() > 0
        {
            warn!("slow consumer detected");
            self.emit(FlowSignal::SlowConsumerDetected);
            self.emit(FlowSignal::SlowDown);
        }

        let popped = inner
            .queues
            .high
            .pop_front()
            .or_else(|| inner.queues.normal.pop_front())
            .or_else(|| inner.queues.low.pop_front());

        if let Some(message) = &popped {
            inner.current_bytes = inner.current_bytes.saturating_sub(message.size);
            inner.last_pop = now;
            self.reevaluate_watermarks(&mut inner);
        }

        popped
    }
}

/// Drives the service loop: pops at `processing_rate` messages/second and
/// forwards them to `output`. Runs until `cancel` fires.
pub async fn run_service_loop<T: Send + 'static>(
    controller: std::sync::Arc<FlowController<T>>,
    output: mpsc::Sender<FlowMessage<T>>,
    cancel: autoqa_types::CancelToken,
) {
    let period = std::time::Duration::from_secs_f64(1.0 / controller.config.processing_rate.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("flow controller service loop stopping");
                return;
            }
            _ = ticker.tick() => {
                if let Some(message) = controller.pop() {
                    if output.send(message).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoqa_types::SystemClock;
    use std::sync::Arc;

    fn config(max_buffer: usize, max_memory: u64) -> FlowControllerConfig {
        FlowControllerConfig {
            max_buffer_size: max_buffer,
            max_memory_usage: max_memory,
            high_water_mark_pct: 0.8,
            low_water_mark_pct: 0.3,
            processing_rate: 1000,
            slow_consumer_threshold: std::time::Duration::from_secs(5),
        }
    }

    fn msg(priority: Priority, size: u64) -> FlowMessage<()> {
        FlowMessage {
            id: Uuid::new_v4(),
            priority,
            size,
            payload: (),
        }
    }

    #[test]
    fn memory_pressure_drops_low_priority_and_rejects() {
        // S1: maxMemoryUsage = 1 MiB, maxBufferSize = 10_000, 100 messages of 50 KiB.
        let controller: FlowController<()> =
            FlowController::new(config(10_000, 1024 * 1024), Arc::new(SystemClock));
        let mut signals = controller.subscribe_signals();

        let mut admitted = 0;
        for _ in 0..100 {
            if controller.enqueue(msg(Priority::Low, 50 * 1024)) == EnqueueOutcome::Admitted {
                admitted += 1;
            }
        }
        assert!(admitted >= 20);
        assert!(controller.current_bytes() <= 1024 * 1024);

        let mut saw_drop_signal = false;
        while let Ok(signal) = signals.try_recv() {
            if matches!(signal, FlowSignal::DropMessages { .. }) {
                saw_drop_signal = true;
            }
        }
        assert!(saw_drop_signal);
    }

    #[test]
    fn buffer_overflow_drops_oldest_normal_messages() {
        let controller: FlowController<()> =
            FlowController::new(config(5, 10 * 1024 * 1024), Arc::new(SystemClock));
        for _ in 0..5 {
            assert_eq!(
                controller.enqueue(msg(Priority::Normal, 1)),
                EnqueueOutcome::Admitted
            );
        }
        let outcome = controller.enqueue(msg(Priority::Normal, 1));
        assert_eq!(
            outcome,
            EnqueueOutcome::Rejected(BackpressureReason::BufferOverflow)
        );
    }

    #[test]
    fn pop_respects_priority_order() {
        let controller: FlowController<()> =
            FlowController::new(config(100, 10 * 1024 * 1024), Arc::new(SystemClock));
        controller.enqueue(msg(Priority::Low, 1));
        controller.enqueue(msg(Priority::Normal, 1));
        controller.enqueue(msg(Priority::High, 1));

        assert_eq!(controller.pop().unwrap().priority, Priority::High);
        assert_eq!(controller.pop().unwrap().priority, Priority::Normal);
        assert_eq!(controller.pop().unwrap().priority, Priority::Low);
        assert!(controller.pop().is_none());
    }

    #[test]
    fn cancel_enqueued_recredits_bytes() {
        let controller: FlowController<()> =
            FlowController::new(config(100, 1000), Arc::new(SystemClock));
        let message = msg(Priority::Normal, 500);
        let id = message.id;
        controller.enqueue(message);
        assert_eq!(controller.current_bytes(), 500);
        assert!(controller.cancel_enqueued(Priority::Normal, id));
        assert_eq!(controller.current_bytes(), 0);
        assert!(!controller.cancel_enqueued(Priority::Normal, id));
    }
}
