pub mod splitter;
pub mod stage_queue;

pub use splitter::FanOutSplitter;
pub use stage_queue::{
    BoundedStageQueue, FailureCallback, StageQueue, StageQueueBuilder, StageRuntimeSnapshot,
    TryEnqueueError,
};
