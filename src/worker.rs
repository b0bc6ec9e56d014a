//! # Async Invalidation Worker
//!
//! Background queue consumer that applies invalidation messages through an
//! injected handler. One loop per instance with an idempotent start/stop
//! lifecycle; messages a previous consumer left in-flight are drained before
//! new batches, malformed payloads are dropped rather than requeued, and a
//! single message's failure never blocks the rest of the batch.

use crate::config::TaggerConfig;
use crate::error::{Result, TaggerError};
use crate::messaging::{Delivery, InvalidationMessage, QueueConsumer, QueueProducer, RetryPolicy};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callback the worker dispatches each deserialized message to.
pub type InvalidationHandler =
    Arc<dyn Fn(InvalidationMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Stopped => write!(f, "stopped"),
            WorkerState::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug)]
struct WorkerStatus {
    state: WorkerState,
    status: String,
}

/// Tuning knobs for the consumer loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Messages fetched per batch.
    pub batch_size: usize,
    /// Sleep when the queue comes back empty.
    pub poll_interval: Duration,
    /// Ceiling on the consecutive-fetch-error counter; bounds the backoff.
    pub max_fetch_errors: u32,
    /// Base backoff after a queue error.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&TaggerConfig::default())
    }
}

impl WorkerConfig {
    pub fn from_config(config: &TaggerConfig) -> Self {
        Self {
            batch_size: config.worker_batch_size,
            poll_interval: config.worker_poll_interval(),
            max_fetch_errors: config.worker_max_fetch_errors,
            error_backoff: config.worker_error_backoff(),
        }
    }
}

/// Background invalidation-message consumer.
pub struct InvalidationWorker {
    consumer: Arc<dyn QueueConsumer>,
    producer: Arc<dyn QueueProducer>,
    retry_policy: Arc<dyn RetryPolicy>,
    config: WorkerConfig,
    status: Arc<Mutex<WorkerStatus>>,
    shutdown: Arc<Notify>,
    stop_flag: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl InvalidationWorker {
    pub fn new(
        consumer: Arc<dyn QueueConsumer>,
        producer: Arc<dyn QueueProducer>,
        retry_policy: Arc<dyn RetryPolicy>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            consumer,
            producer,
            retry_policy,
            config,
            status: Arc::new(Mutex::new(WorkerStatus {
                state: WorkerState::Stopped,
                status: "stopped".to_string(),
            })),
            shutdown: Arc::new(Notify::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the consumer loop. Calling start on a running worker logs and
    /// no-ops.
    pub fn start(&self, handler: InvalidationHandler) {
        {
            let mut status = self.status.lock();
            if status.state == WorkerState::Running {
                warn!("WORKER: start called while already running; ignoring");
                return;
            }
            status.state = WorkerState::Running;
            status.status = "running".to_string();
        }

        self.stop_flag.store(false, Ordering::SeqCst);

        let ctx = LoopContext {
            consumer: self.consumer.clone(),
            retry_policy: self.retry_policy.clone(),
            handler,
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        };

        *self.handle.lock() = Some(tokio::spawn(run_loop(ctx)));
        info!("🚀 WORKER: invalidation worker started");
    }

    /// Stop the consumer loop and wait for it to unwind. Calling stop on a
    /// stopped worker logs and no-ops.
    pub async fn stop(&self) {
        let handle = {
            let mut status = self.status.lock();
            if status.state == WorkerState::Stopped {
                info!("WORKER: stop called while already stopped; ignoring");
                return;
            }
            status.state = WorkerState::Stopped;
            status.status = "stopped".to_string();
            self.handle.lock().take()
        };

        self.stop_flag.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "WORKER: loop panicked");
                }
            }
        }
        info!("🛑 WORKER: invalidation worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.status.lock().state == WorkerState::Running
    }

    /// Human-readable status line.
    pub fn status(&self) -> String {
        self.status.lock().status.clone()
    }

    /// Serialize and enqueue an invalidation message. Enqueue errors surface
    /// directly; retrying is the caller's decision.
    pub async fn put(&self, message: &InvalidationMessage) -> Result<()> {
        let payload = message
            .to_json()
            .map_err(|e| TaggerError::message_serialization(e.to_string()))?;
        self.producer.put(payload).await
    }
}

struct LoopContext {
    consumer: Arc<dyn QueueConsumer>,
    retry_policy: Arc<dyn RetryPolicy>,
    handler: InvalidationHandler,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
    stop_flag: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
}

impl LoopContext {
    fn stopping(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: impl Into<String>) {
        self.status.lock().status = status.into();
    }

    /// Interruptible sleep; true means shutdown was signalled. The stop flag
    /// is re-checked on wake so a permit left over from a previous run's stop
    /// cannot end the current one.
    async fn idle(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.notified() => self.stopping(),
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

async fn run_loop(ctx: LoopContext) {
    info!("WORKER: consumer loop entered");
    let mut fetch_errors: u32 = 0;

    'main: loop {
        if ctx.stopping() {
            break;
        }

        // Messages a crashed or slow consumer left in-flight come first
        loop {
            if ctx.stopping() {
                break 'main;
            }
            match ctx.consumer.get_unacked().await {
                Ok(Some(delivery)) => {
                    dispatch(&ctx, delivery).await;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "WORKER: failed to read unacknowledged messages; backing off");
                    if ctx.idle(ctx.config.error_backoff).await {
                        break 'main;
                    }
                }
            }
        }

        match ctx.consumer.mget(ctx.config.batch_size).await {
            Ok(batch) if batch.is_empty() => {
                if fetch_errors > 0 {
                    ctx.set_status("running");
                }
                fetch_errors = 0;
                if ctx.idle(ctx.config.poll_interval).await {
                    break;
                }
            }
            Ok(batch) => {
                if fetch_errors > 0 {
                    ctx.set_status("running");
                }
                fetch_errors = 0;
                debug!(count = batch.len(), "WORKER: processing batch");
                for delivery in batch {
                    if ctx.stopping() {
                        break 'main;
                    }
                    dispatch(&ctx, delivery).await;
                }
            }
            Err(e) => {
                fetch_errors = (fetch_errors + 1).min(ctx.config.max_fetch_errors);
                error!(
                    error = %e,
                    consecutive_errors = fetch_errors,
                    "WORKER: queue fetch failed"
                );
                ctx.set_status(format!(
                    "running: backing off after {fetch_errors} fetch errors"
                ));
                if ctx.idle(ctx.config.error_backoff * fetch_errors).await {
                    break;
                }
            }
        }
    }

    info!("WORKER: consumer loop exited");
}

/// Process one delivery end to end: deserialize, invoke the handler in its
/// own task so a panic cannot take the loop down, then ack, requeue, or fail.
async fn dispatch(ctx: &LoopContext, delivery: Delivery) {
    let message = match InvalidationMessage::from_json(&delivery.payload) {
        Ok(message) => message,
        Err(e) => {
            // Redelivery cannot fix a bad payload
            error!(
                msg_id = delivery.id,
                error = %e,
                "WORKER: malformed invalidation message; dropping"
            );
            if let Err(fail_err) = ctx.consumer.fail(delivery.id).await {
                warn!(msg_id = delivery.id, error = %fail_err, "WORKER: failed to drop message");
            }
            return;
        }
    };

    // The worker never re-enables propagation; fan-out stops one hop out
    let message = InvalidationMessage {
        propagate: false,
        ..message
    };

    let handler_future = (ctx.handler)(message);
    let outcome = match tokio::spawn(handler_future).await {
        Ok(result) => result,
        Err(join_err) => Err(TaggerError::invalid_state(format!(
            "invalidation handler panicked: {join_err}"
        ))),
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = ctx.consumer.ack(delivery.id).await {
                warn!(msg_id = delivery.id, error = %e, "WORKER: ack failed");
            } else {
                debug!(msg_id = delivery.id, "WORKER: message processed");
            }
        }
        Err(e) => {
            if ctx.retry_policy.should_retry(&delivery, &e) {
                warn!(
                    msg_id = delivery.id,
                    attempts = delivery.delivery_attempts,
                    error = %e,
                    "WORKER: handler failed; requeueing"
                );
                if let Err(rq_err) = ctx.consumer.requeue(delivery.id).await {
                    warn!(msg_id = delivery.id, error = %rq_err, "WORKER: requeue failed");
                }
            } else {
                error!(
                    msg_id = delivery.id,
                    attempts = delivery.delivery_attempts,
                    error = %e,
                    "WORKER: handler failed; dropping message"
                );
                if let Err(fail_err) = ctx.consumer.fail(delivery.id).await {
                    warn!(msg_id = delivery.id, error = %fail_err, "WORKER: failed to drop message");
                }
            }
        }
    }
}
