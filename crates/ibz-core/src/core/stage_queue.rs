use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::IbzError;
use crate::telemetry::tags;
use crate::telemetry::{DefaultStageTelemetry, StageTelemetry};
use crate::types::{Result, duration_to_us};

/// Receives every error raised by a stage handler.
///
/// Invoked on the stage's worker thread, once per failing item.
pub type FailureCallback = Arc<dyn Fn(IbzError) + Send + Sync>;

/// Reason an item was not admitted by [`StageQueue::try_enqueue`].
///
/// The rejected item is always handed back to the caller.
pub enum TryEnqueueError<T> {
    /// The backlog is at capacity.
    Full(T),
    /// The queue was cancelled and accepts nothing anymore.
    Cancelled(T),
    /// The queue was shut down.
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Cancelled(item) | Self::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Cancelled(_) => f.write_str("Cancelled(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("stage backlog is full"),
            Self::Cancelled(_) => f.write_str("stage was cancelled"),
            Self::Closed(_) => f.write_str("stage was shut down"),
        }
    }
}

impl<T> std::error::Error for TryEnqueueError<T> {}

/// Runtime counters for one stage worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRuntimeSnapshot {
    pub name: String,
    pub items_completed: usize,
    pub items_failed: usize,
    pub backlog: usize,
    pub busy: Duration,
}

/// A pipeline stage that accepts items and processes them asynchronously.
///
/// Implemented by a single [`BoundedStageQueue`] and by a [`FanOutSplitter`]
/// over several of them, so callers treat one worker and N workers alike.
///
/// [`FanOutSplitter`]: crate::core::FanOutSplitter
pub trait StageQueue<T>: Send + Sync {
    /// Admits `item` without blocking, or hands it back.
    fn try_enqueue(&self, item: T) -> std::result::Result<(), TryEnqueueError<T>>;

    /// Blocks until capacity is available or the queue is cancelled.
    fn wait_for_ready(&self) -> Result<()>;

    /// Stops admission and execution of queued items. Idempotent.
    fn cancel(&self);

    fn is_running(&self) -> bool;

    fn ready_to_enqueue(&self) -> bool;

    /// Drains admitted items, then stops and joins the worker(s). Idempotent.
    fn shutdown(&self);

    fn runtime_snapshot(&self) -> Vec<StageRuntimeSnapshot>;

    /// Admits `item`, suspending while the backlog is full.
    ///
    /// Fails with [`IbzError::Cancelled`] if the queue is cancelled or shut
    /// down before the item is admitted.
    fn enqueue(&self, mut item: T) -> Result<()> {
        loop {
            match self.try_enqueue(item) {
                Ok(()) => return Ok(()),
                Err(TryEnqueueError::Full(rejected)) => {
                    item = rejected;
                    self.wait_for_ready()?;
                }
                Err(TryEnqueueError::Cancelled(_)) | Err(TryEnqueueError::Closed(_)) => {
                    return Err(IbzError::Cancelled);
                }
            }
        }
    }
}

enum Slot<T> {
    Item(T),
    Stop,
}

struct QueueState<T> {
    backlog: VecDeque<Slot<T>>,
    // Admitted items not yet finished executing.
    pending: usize,
    running: bool,
    closed: bool,
}

struct Shared<T> {
    name: String,
    capacity: usize,
    state: Mutex<QueueState<T>>,
    work_ready: Condvar,
    capacity_ready: Condvar,
    telemetry: Arc<dyn StageTelemetry>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    busy_us: AtomicU64,
}

impl<T> Shared<T> {
    fn lock_state(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_item(&self) -> Option<T> {
        let mut state = self.lock_state();
        loop {
            if !state.running {
                return None;
            }

            match state.backlog.pop_front() {
                Some(Slot::Item(item)) => return Some(item),
                Some(Slot::Stop) => return None,
                None => {
                    state = self
                        .work_ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release_slot(&self) {
        let backlog = {
            let mut state = self.lock_state();
            state.pending = state.pending.saturating_sub(1);
            state.pending
        };
        self.capacity_ready.notify_all();
        self.telemetry.on_backlog(&self.name, backlog);
    }
}

/// Configures and spawns a [`BoundedStageQueue`].
pub struct StageQueueBuilder<T> {
    name: String,
    capacity: usize,
    downstream: Option<Arc<dyn StageQueue<T>>>,
    on_failure: Option<FailureCallback>,
    telemetry: Arc<dyn StageTelemetry>,
}

impl<T: Send + 'static> StageQueueBuilder<T> {
    /// Stage that receives every item the handler returns.
    pub fn downstream(mut self, downstream: Arc<dyn StageQueue<T>>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    pub fn on_failure(mut self, on_failure: FailureCallback) -> Self {
        self.on_failure = Some(on_failure);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn StageTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Starts the dedicated worker thread running `handler` on every item.
    ///
    /// A handler returning `Ok(Some(output))` forwards `output` downstream.
    pub fn spawn<H>(self, handler: H) -> Result<BoundedStageQueue<T>>
    where
        H: FnMut(T) -> Result<Option<T>> + Send + 'static,
    {
        if self.capacity < 1 {
            return Err(IbzError::InvalidArgument(
                "stage capacity cannot be less than one",
            ));
        }

        let shared = Arc::new(Shared {
            name: self.name,
            capacity: self.capacity,
            state: Mutex::new(QueueState {
                backlog: VecDeque::with_capacity(self.capacity + 1),
                pending: 0,
                running: true,
                closed: false,
            }),
            work_ready: Condvar::new(),
            capacity_ready: Condvar::new(),
            telemetry: self.telemetry,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            busy_us: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let downstream = self.downstream;
        let on_failure = self.on_failure;
        let worker = thread::Builder::new()
            .name(format!("ibz-{}", shared.name))
            .spawn(move || run_worker_loop(worker_shared, handler, downstream, on_failure))?;

        tracing::debug!(
            target: tags::TARGET_STAGE,
            stage = %shared.name,
            capacity = shared.capacity,
            "stage worker started"
        );

        Ok(BoundedStageQueue {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }
}

/// Single-worker stage with a capacity-limited backlog.
///
/// Items execute in admission order on one dedicated thread. An item counts
/// against capacity from admission until its handler returns.
pub struct BoundedStageQueue<T> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> BoundedStageQueue<T> {
    pub fn builder(name: impl Into<String>, capacity: usize) -> StageQueueBuilder<T> {
        StageQueueBuilder {
            name: name.into(),
            capacity,
            downstream: None,
            on_failure: None,
            telemetry: Arc::new(DefaultStageTelemetry),
        }
    }

    /// Spawns a stage with default telemetry.
    pub fn spawn<H>(
        name: impl Into<String>,
        capacity: usize,
        handler: H,
        downstream: Option<Arc<dyn StageQueue<T>>>,
        on_failure: Option<FailureCallback>,
    ) -> Result<Self>
    where
        H: FnMut(T) -> Result<Option<T>> + Send + 'static,
    {
        let mut builder = Self::builder(name, capacity);
        builder.downstream = downstream;
        builder.on_failure = on_failure;
        builder.spawn(handler)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// True once [`StageQueue::shutdown`] has begun.
    pub fn is_closed(&self) -> bool {
        self.shared.lock_state().closed
    }

    /// Number of admitted items that have not finished executing.
    pub fn backlog(&self) -> usize {
        self.shared.lock_state().pending
    }

    fn snapshot(&self) -> StageRuntimeSnapshot {
        StageRuntimeSnapshot {
            name: self.shared.name.clone(),
            items_completed: self.shared.completed.load(Ordering::Acquire),
            items_failed: self.shared.failed.load(Ordering::Acquire),
            backlog: self.backlog(),
            busy: Duration::from_micros(self.shared.busy_us.load(Ordering::Acquire)),
        }
    }
}

impl<T: Send + 'static> StageQueue<T> for BoundedStageQueue<T> {
    fn try_enqueue(&self, item: T) -> std::result::Result<(), TryEnqueueError<T>> {
        let backlog = {
            let mut state = self.shared.lock_state();
            if !state.running {
                return Err(TryEnqueueError::Cancelled(item));
            }
            if state.closed {
                return Err(TryEnqueueError::Closed(item));
            }
            if state.pending >= self.shared.capacity {
                return Err(TryEnqueueError::Full(item));
            }

            state.pending += 1;
            state.backlog.push_back(Slot::Item(item));
            state.pending
        };

        self.shared.work_ready.notify_one();
        self.shared.telemetry.on_backlog(&self.shared.name, backlog);
        Ok(())
    }

    fn wait_for_ready(&self) -> Result<()> {
        let mut state = self.shared.lock_state();
        loop {
            if !state.running || state.closed {
                return Err(IbzError::Cancelled);
            }
            if state.pending < self.shared.capacity {
                return Ok(());
            }

            state = self
                .shared
                .capacity_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn cancel(&self) {
        let was_running = {
            let mut state = self.shared.lock_state();
            std::mem::replace(&mut state.running, false)
        };
        self.shared.work_ready.notify_all();
        self.shared.capacity_ready.notify_all();

        if was_running {
            tracing::debug!(target: tags::TARGET_STAGE, stage = %self.shared.name, "stage cancelled");
        }
    }

    fn is_running(&self) -> bool {
        self.shared.lock_state().running
    }

    fn ready_to_enqueue(&self) -> bool {
        let state = self.shared.lock_state();
        state.running && !state.closed && state.pending < self.shared.capacity
    }

    fn shutdown(&self) {
        if !self.close_and_join() {
            return;
        }

        tracing::debug!(
            target: tags::TARGET_STAGE,
            stage = %self.shared.name,
            completed = self.shared.completed.load(Ordering::Acquire),
            failed = self.shared.failed.load(Ordering::Acquire),
            "stage worker stopped"
        );
    }

    fn runtime_snapshot(&self) -> Vec<StageRuntimeSnapshot> {
        vec![self.snapshot()]
    }
}

impl<T> BoundedStageQueue<T> {
    /// Queues the stop marker behind admitted items and joins the worker.
    ///
    /// Returns false if the worker was already joined.
    fn close_and_join(&self) -> bool {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return false;
        };

        {
            let mut state = self.shared.lock_state();
            state.closed = true;
            state.backlog.push_back(Slot::Stop);
        }
        self.shared.work_ready.notify_all();
        self.shared.capacity_ready.notify_all();

        if worker.join().is_err() {
            tracing::error!(target: tags::TARGET_STAGE, stage = %self.shared.name, "stage worker thread panicked");
        }
        true
    }
}

impl<T> Drop for BoundedStageQueue<T> {
    fn drop(&mut self) {
        self.close_and_join();
    }
}

fn run_worker_loop<T, H>(
    shared: Arc<Shared<T>>,
    mut handler: H,
    downstream: Option<Arc<dyn StageQueue<T>>>,
    on_failure: Option<FailureCallback>,
) where
    H: FnMut(T) -> Result<Option<T>>,
{
    while let Some(item) = shared.next_item() {
        shared.telemetry.on_item_started(&shared.name);
        let started_at = Instant::now();

        let outcome = match catch_unwind(AssertUnwindSafe(|| handler(item))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(IbzError::WorkerPanicked(panic_message(payload.as_ref()))),
        };

        let elapsed = started_at.elapsed();
        shared
            .busy_us
            .fetch_add(duration_to_us(elapsed), Ordering::AcqRel);

        let output = match outcome {
            Ok(output) => {
                shared.completed.fetch_add(1, Ordering::AcqRel);
                shared.telemetry.on_item_finished(&shared.name, elapsed);
                output
            }
            Err(error) => {
                shared.failed.fetch_add(1, Ordering::AcqRel);
                shared.telemetry.on_item_failed(&shared.name, elapsed);
                report_failure(&shared.name, on_failure.as_ref(), error);
                None
            }
        };

        shared.release_slot();

        if let (Some(output), Some(next)) = (output, downstream.as_ref()) {
            match next.enqueue(output) {
                Ok(()) => {}
                Err(error) if error.is_cancelled() => {
                    tracing::debug!(
                        target: tags::TARGET_STAGE,
                        stage = %shared.name,
                        "downstream cancelled; dropping output"
                    );
                }
                Err(error) => report_failure(&shared.name, on_failure.as_ref(), error),
            }
        }
    }
}

fn report_failure(stage: &str, on_failure: Option<&FailureCallback>, error: IbzError) {
    tracing::debug!(target: tags::TARGET_STAGE, stage, error = %error, "stage handler failed");
    if let Some(on_failure) = on_failure {
        on_failure(error);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
