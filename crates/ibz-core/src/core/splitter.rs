use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::core::stage_queue::{
    BoundedStageQueue, FailureCallback, StageQueue, StageRuntimeSnapshot, TryEnqueueError,
};
use crate::error::IbzError;
use crate::telemetry::tags;
use crate::types::Result;

/// Sleep between readiness checks while every sub-queue is full.
pub const SPLITTER_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Round-robin fan-out over several bounded stage queues.
///
/// Exposes the same [`StageQueue`] contract as a single queue. Every
/// admission attempt advances the round-robin pointer, so a sub-queue that
/// stays full is skipped by subsequent retries instead of stalling dispatch.
pub struct FanOutSplitter<T> {
    queues: Vec<BoundedStageQueue<T>>,
    next: AtomicUsize,
}

impl<T: Send + 'static> FanOutSplitter<T> {
    pub fn new(queues: Vec<BoundedStageQueue<T>>) -> Result<Self> {
        if queues.is_empty() {
            return Err(IbzError::InvalidArgument(
                "splitter requires at least one sub-queue",
            ));
        }

        Ok(Self {
            queues,
            next: AtomicUsize::new(0),
        })
    }

    /// Spawns `width` sub-queues named `{name}-{index}` sharing one downstream.
    ///
    /// `make_handler` is called once per sub-queue with its index.
    pub fn spawn<H, F>(
        name: &str,
        width: usize,
        capacity: usize,
        mut make_handler: F,
        downstream: Option<Arc<dyn StageQueue<T>>>,
        on_failure: Option<FailureCallback>,
    ) -> Result<Self>
    where
        H: FnMut(T) -> Result<Option<T>> + Send + 'static,
        F: FnMut(usize) -> H,
    {
        let mut queues = Vec::with_capacity(width);
        for index in 0..width {
            let mut builder = BoundedStageQueue::builder(format!("{name}-{index}"), capacity);
            if let Some(downstream) = &downstream {
                builder = builder.downstream(Arc::clone(downstream));
            }
            if let Some(on_failure) = &on_failure {
                builder = builder.on_failure(Arc::clone(on_failure));
            }
            queues.push(builder.spawn(make_handler(index))?);
        }

        tracing::debug!(target: tags::TARGET_STAGE, stage = name, width, capacity, "splitter started");
        Self::new(queues)
    }

    pub fn width(&self) -> usize {
        self.queues.len()
    }

    pub fn queues(&self) -> &[BoundedStageQueue<T>] {
        &self.queues
    }

    fn all_closed(&self) -> bool {
        self.queues
            .iter()
            .all(|queue| queue.is_closed() || !queue.is_running())
    }
}

impl<T: Send + 'static> StageQueue<T> for FanOutSplitter<T> {
    fn try_enqueue(&self, item: T) -> std::result::Result<(), TryEnqueueError<T>> {
        let index = self.next.fetch_add(1, Ordering::AcqRel) % self.queues.len();

        match self.queues[index].try_enqueue(item) {
            Ok(()) => Ok(()),
            Err(TryEnqueueError::Closed(item)) if self.all_closed() => {
                Err(TryEnqueueError::Closed(item))
            }
            Err(rejected) => {
                let item = rejected.into_inner();
                if self.is_running() {
                    Err(TryEnqueueError::Full(item))
                } else {
                    Err(TryEnqueueError::Cancelled(item))
                }
            }
        }
    }

    fn wait_for_ready(&self) -> Result<()> {
        loop {
            if self.ready_to_enqueue() {
                return Ok(());
            }
            if !self.is_running() || self.all_closed() {
                return Err(IbzError::Cancelled);
            }

            thread::sleep(SPLITTER_POLL_INTERVAL);
        }
    }

    fn cancel(&self) {
        for queue in &self.queues {
            queue.cancel();
        }
    }

    fn is_running(&self) -> bool {
        self.queues.iter().any(|queue| queue.is_running())
    }

    fn ready_to_enqueue(&self) -> bool {
        self.queues.iter().any(|queue| queue.ready_to_enqueue())
    }

    fn shutdown(&self) {
        for queue in &self.queues {
            queue.shutdown();
        }
    }

    fn runtime_snapshot(&self) -> Vec<StageRuntimeSnapshot> {
        self.queues
            .iter()
            .flat_map(|queue| queue.runtime_snapshot())
            .collect()
    }
}
