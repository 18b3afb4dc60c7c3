//! Orchestrates one compress or decompress run.
//!
//! The caller's thread reads chunks from the source and feeds a fan-out of
//! transform workers, which forward to a single writer stage that owns the
//! destination file. Failures raised on any worker are collected through a
//! channel and polled by the producer before every enqueue.

pub mod report;
pub mod validate;

use std::fs::{self, File};
use std::io::{BufReader, Seek};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::config::PipelineConfig;
use crate::core::{BoundedStageQueue, FailureCallback, FanOutSplitter, StageQueue};
use crate::error::IbzError;
use crate::format::{
    self, BlockReader, ChunkSource, RecordReader, compress_chunk, decompress_chunk,
};
use crate::progress::{Progress, ProgressObserver};
use crate::telemetry::{self, tags};
use crate::types::{Chunk, Mode, Result, duration_to_us};

pub use report::{ReportExport, ReportValue, RunReport, RunReportBuilder, StageReport};
pub use validate::validate_arguments;

type TransformFn = fn(&Chunk, u32) -> Result<Chunk>;
type WriteFn = fn(&mut File, &Chunk) -> Result<()>;

const WRITER_STAGE: &str = "writer";
const TRANSFORM_STAGE: &str = "transform";

/// Multi-threaded block compressor producing offset-addressed containers.
///
/// One instance may serve many sequential runs; progress resets at the start
/// of each run.
pub struct ParallelCompressor {
    config: PipelineConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
    progress: Progress,
}

impl ParallelCompressor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: config.normalized(),
            observer: None,
            progress: Progress::new(),
        }
    }

    pub fn with_observer(config: PipelineConfig, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Progress of the current or most recent run, 0 through 100.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn compress(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> RunReport {
        self.run(Mode::Compress, input.as_ref(), output.as_ref())
    }

    pub fn decompress(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> RunReport {
        self.run(Mode::Decompress, input.as_ref(), output.as_ref())
    }

    /// Runs the pipeline in `mode`. Never fails; errors land in the report.
    pub fn run(&self, mode: Mode, input: &Path, output: &Path) -> RunReport {
        let started_at = Instant::now();
        self.progress.reset();
        telemetry::increment_counter(tags::METRIC_PIPELINE_RUN_COUNT, 1);

        let mut builder = RunReportBuilder::new(mode, input, output);
        match self.execute(mode, input, output, &mut builder) {
            Ok(()) => self.progress.finish(self.observer.as_deref()),
            Err(error) => {
                telemetry::increment_counter(tags::METRIC_PIPELINE_RUN_FAIL_COUNT, 1);
                tracing::warn!(
                    target: tags::TARGET_PIPELINE,
                    mode = mode.as_str(),
                    input = %input.display(),
                    output = %output.display(),
                    error = %error,
                    "run failed"
                );
                builder.error(&error);
            }
        }

        let elapsed = started_at.elapsed();
        builder.elapsed(elapsed);
        let report = builder.build();

        telemetry::increment_counter(tags::METRIC_PIPELINE_INPUT_BYTES, report.input_len);
        telemetry::increment_counter(tags::METRIC_PIPELINE_OUTPUT_BYTES, report.output_len);
        tracing::info!(
            target: tags::TARGET_PIPELINE,
            mode = mode.as_str(),
            input_bytes = report.input_len,
            output_bytes = report.output_len,
            chunks = report.chunks,
            elapsed_us = duration_to_us(elapsed),
            success = report.is_success(),
            "run finished"
        );
        report
    }

    fn execute(
        &self,
        mode: Mode,
        input: &Path,
        output: &Path,
        builder: &mut RunReportBuilder,
    ) -> Result<()> {
        validate_arguments(input, output)?;

        let source = File::open(input)
            .map_err(|error| IbzError::from(error).with_context("opening source"))?;
        let total = source.metadata()?.len();
        builder.input_len(total);

        let mut destination = File::create(output)
            .map_err(|error| IbzError::from(error).with_context("creating destination"))?;

        let outcome = match mode {
            Mode::Compress => {
                format::write_signature(&mut destination)?;
                let blocks = BlockReader::new(source, self.config.block_size);
                self.drive(
                    blocks,
                    total,
                    destination,
                    compress_chunk,
                    write_compressed,
                    builder,
                )
            }
            Mode::Decompress => {
                let records = RecordReader::open(BufReader::new(source))?;
                self.drive(
                    records,
                    total,
                    destination,
                    |chunk, _level| decompress_chunk(chunk),
                    write_decompressed,
                    builder,
                )
            }
        };

        if let Ok(metadata) = fs::metadata(output) {
            builder.output_len(metadata.len());
        }
        outcome
    }

    fn drive<S: ChunkSource>(
        &self,
        mut source: S,
        total: u64,
        mut destination: File,
        transform: TransformFn,
        write: WriteFn,
        builder: &mut RunReportBuilder,
    ) -> Result<()> {
        let (failure_tx, failure_rx) = crossbeam_channel::unbounded::<IbzError>();
        let on_failure: FailureCallback = Arc::new(move |error: IbzError| {
            let _ = failure_tx.send(error);
        });

        let written = Arc::new(AtomicU64::new(destination.stream_position()?));
        let writer_written = Arc::clone(&written);
        let writer = Arc::new(
            BoundedStageQueue::builder(WRITER_STAGE, self.config.queue_capacity)
                .on_failure(Arc::clone(&on_failure))
                .spawn(move |chunk: Chunk| {
                    write(&mut destination, &chunk)?;
                    writer_written.fetch_max(destination.stream_position()?, Ordering::AcqRel);
                    Ok(None)
                })?,
        );

        let level = self.config.compression_level;
        let downstream: Arc<dyn StageQueue<Chunk>> = writer.clone();
        let transformer = FanOutSplitter::spawn(
            TRANSFORM_STAGE,
            self.config.workers,
            self.config.queue_capacity,
            move |_| move |chunk: Chunk| transform(&chunk, level).map(Some),
            Some(downstream),
            Some(on_failure),
        )?;

        tracing::debug!(
            target: tags::TARGET_PIPELINE,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            total,
            "pipeline started"
        );

        let mut chunks = 0u64;
        let outcome = loop {
            if let Some(error) = first_failure(&failure_rx) {
                break Err(error);
            }

            let chunk = match source.next() {
                Some(Ok(chunk)) => chunk,
                Some(Err(error)) => break Err(error),
                None => break Ok(()),
            };

            if let Err(error) = transformer.enqueue(chunk) {
                break Err(error);
            }
            chunks += 1;
            telemetry::increment_counter(tags::METRIC_PIPELINE_CHUNK_COUNT, 1);

            self.progress
                .update(source.consumed(), total, self.observer.as_deref());
            builder.output_len(written.load(Ordering::Acquire));
        };

        if outcome.is_err() {
            writer.cancel();
            transformer.cancel();
        }

        transformer.shutdown();
        writer.shutdown();

        let mut stages = transformer.runtime_snapshot();
        stages.extend(writer.runtime_snapshot());
        builder.chunks(chunks).stages(&stages);

        // A worker failure outranks the cancellation it caused in the producer.
        match (outcome, first_failure(&failure_rx)) {
            (_, Some(error)) => Err(error),
            (Err(error), None) => Err(error),
            (Ok(()), None) => Ok(()),
        }
    }
}

impl Default for ParallelCompressor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn first_failure(failures: &Receiver<IbzError>) -> Option<IbzError> {
    failures.try_recv().ok()
}

fn write_compressed(destination: &mut File, chunk: &Chunk) -> Result<()> {
    format::write_record(destination, chunk).map(|_| ())
}

fn write_decompressed(destination: &mut File, chunk: &Chunk) -> Result<()> {
    format::write_at(destination, chunk)
}

/// Compresses `input` into `output` with the default configuration.
pub fn compress(input: impl AsRef<Path>, output: impl AsRef<Path>) -> RunReport {
    ParallelCompressor::default().compress(input, output)
}

/// Restores `output` from the container at `input` with the default configuration.
pub fn decompress(input: impl AsRef<Path>, output: impl AsRef<Path>) -> RunReport {
    ParallelCompressor::default().decompress(input, output)
}
