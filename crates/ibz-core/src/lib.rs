//! Parallel chunked compression with an offset-addressed container format.
//!
//! Files are split into fixed-size blocks, compressed independently on a
//! fan-out of worker threads and written as self-describing records in
//! completion order. Each record carries its original offset, so
//! decompression can restore blocks in any order.

pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod progress;
pub mod telemetry;
pub mod types;

pub use config::PipelineConfig;
pub use crate::core::{
    BoundedStageQueue, FailureCallback, FanOutSplitter, StageQueue, StageRuntimeSnapshot,
    TryEnqueueError,
};
pub use error::{ErrorKind, IbzError};
pub use pipeline::{
    ParallelCompressor, ReportExport, ReportValue, RunReport, RunReportBuilder, compress,
    decompress,
};
pub use progress::{Progress, ProgressObserver};
pub use telemetry::stage::{DefaultStageTelemetry, StageTelemetry};
pub use types::{Chunk, Mode, Result};
