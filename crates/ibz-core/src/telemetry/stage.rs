use std::time::Duration;

use crate::telemetry::{self, tags};
use crate::types::duration_to_us;

/// Hooks invoked by a stage worker around each item it executes.
pub trait StageTelemetry: Send + Sync {
    fn on_backlog(&self, stage: &str, backlog: usize);
    fn on_item_started(&self, stage: &str);
    fn on_item_finished(&self, stage: &str, elapsed: Duration);
    fn on_item_failed(&self, stage: &str, elapsed: Duration);
}

/// Records stage metrics and emits `tracing` events on [`tags::TARGET_STAGE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStageTelemetry;

impl StageTelemetry for DefaultStageTelemetry {
    fn on_backlog(&self, _stage: &str, backlog: usize) {
        telemetry::set_gauge(tags::METRIC_STAGE_BACKLOG, backlog as u64);
    }

    fn on_item_started(&self, stage: &str) {
        telemetry::increment_counter(tags::METRIC_STAGE_ITEM_START_COUNT, 1);
        telemetry::add_gauge(tags::METRIC_STAGE_ACTIVE_COUNT, 1);

        tracing::trace!(target: tags::TARGET_STAGE, stage, op = "item_start", "stage item started");
    }

    fn on_item_finished(&self, stage: &str, elapsed: Duration) {
        let elapsed_us = duration_to_us(elapsed);

        telemetry::increment_counter(tags::METRIC_STAGE_ITEM_FINISH_COUNT, 1);
        telemetry::record_histogram(tags::METRIC_STAGE_ITEM_LATENCY_US, elapsed_us);
        telemetry::sub_gauge_saturating(tags::METRIC_STAGE_ACTIVE_COUNT, 1);

        tracing::trace!(
            target: tags::TARGET_STAGE,
            stage,
            op = "item_finish",
            result = "ok",
            elapsed_us,
            "stage item finished"
        );
    }

    fn on_item_failed(&self, stage: &str, elapsed: Duration) {
        let elapsed_us = duration_to_us(elapsed);

        telemetry::increment_counter(tags::METRIC_STAGE_ITEM_FAIL_COUNT, 1);
        telemetry::record_histogram(tags::METRIC_STAGE_ITEM_LATENCY_US, elapsed_us);
        telemetry::sub_gauge_saturating(tags::METRIC_STAGE_ACTIVE_COUNT, 1);

        tracing::debug!(
            target: tags::TARGET_STAGE,
            stage,
            op = "item_finish",
            result = "error",
            elapsed_us,
            "stage item failed"
        );
    }
}
