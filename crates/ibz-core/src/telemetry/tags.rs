/// Tracing target for stage queue lifecycle and worker events.
pub const TARGET_STAGE: &str = "ibz.stage";
/// Tracing target for orchestrator events.
pub const TARGET_PIPELINE: &str = "ibz.pipeline";
/// Tracing target for container format events.
pub const TARGET_FORMAT: &str = "ibz.format";

pub const METRIC_STAGE_ITEM_START_COUNT: &str = "ibz.stage.item.start.count";
pub const METRIC_STAGE_ITEM_FINISH_COUNT: &str = "ibz.stage.item.finish.count";
pub const METRIC_STAGE_ITEM_FAIL_COUNT: &str = "ibz.stage.item.fail.count";
pub const METRIC_STAGE_ITEM_LATENCY_US: &str = "ibz.stage.item.latency_us";
pub const METRIC_STAGE_ACTIVE_COUNT: &str = "ibz.stage.active.count";
pub const METRIC_STAGE_BACKLOG: &str = "ibz.stage.backlog";

pub const METRIC_PIPELINE_RUN_COUNT: &str = "ibz.pipeline.run.count";
pub const METRIC_PIPELINE_RUN_FAIL_COUNT: &str = "ibz.pipeline.run.fail.count";
pub const METRIC_PIPELINE_CHUNK_COUNT: &str = "ibz.pipeline.chunk.count";
pub const METRIC_PIPELINE_INPUT_BYTES: &str = "ibz.pipeline.input_bytes";
pub const METRIC_PIPELINE_OUTPUT_BYTES: &str = "ibz.pipeline.output_bytes";
