use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::StageRuntimeSnapshot;
use crate::error::{ErrorKind, IbzError};
use crate::types::{Mode, duration_to_us};

/// Extensible scalar value used by report exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportValue {
    U64(u64),
    Duration(Duration),
    Bool(bool),
    Text(String),
}

/// Flattens a report into dotted keys for machine consumption.
pub trait ReportExport {
    fn to_flat_map(&self) -> BTreeMap<String, ReportValue>;
}

/// Per-stage metrics captured when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub items_completed: usize,
    pub items_failed: usize,
    pub busy: Duration,
}

impl StageReport {
    pub fn from_runtime(runtime: &StageRuntimeSnapshot) -> Self {
        Self {
            name: runtime.name.clone(),
            items_completed: runtime.items_completed,
            items_failed: runtime.items_failed,
            busy: runtime.busy,
        }
    }
}

/// Outcome of one compress or decompress invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: Mode,
    pub error: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub input_path: PathBuf,
    pub input_len: u64,
    pub output_path: PathBuf,
    pub output_len: u64,
    pub elapsed: Duration,
    pub chunks: u64,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Process exit status: 0 on success, the error kind's code otherwise.
    pub fn exit_code(&self) -> i32 {
        self.error.map_or(0, ErrorKind::exit_code)
    }

    /// One-line human summary of the run.
    pub fn summary(&self) -> String {
        match self.error {
            Some(kind) => kind.describe().to_string(),
            None => format!(
                "File {} ({} bytes) was {} to file {} ({} bytes) in {}",
                self.input_path.display(),
                self.input_len,
                self.mode.past_tense(),
                self.output_path.display(),
                self.output_len,
                format_elapsed(self.elapsed)
            ),
        }
    }
}

impl ReportExport for RunReport {
    fn to_flat_map(&self) -> BTreeMap<String, ReportValue> {
        let mut out = BTreeMap::new();
        out.insert(
            "run.mode".to_string(),
            ReportValue::Text(self.mode.as_str().to_string()),
        );
        out.insert("run.success".to_string(), ReportValue::Bool(self.is_success()));
        out.insert(
            "run.elapsed_us".to_string(),
            ReportValue::U64(duration_to_us(self.elapsed)),
        );
        out.insert(
            "run.input_path".to_string(),
            ReportValue::Text(self.input_path.display().to_string()),
        );
        out.insert("run.input_bytes".to_string(), ReportValue::U64(self.input_len));
        out.insert(
            "run.output_path".to_string(),
            ReportValue::Text(self.output_path.display().to_string()),
        );
        out.insert(
            "run.output_bytes".to_string(),
            ReportValue::U64(self.output_len),
        );
        out.insert("run.chunks".to_string(), ReportValue::U64(self.chunks));

        if let Some(kind) = self.error {
            out.insert(
                "run.error_kind".to_string(),
                ReportValue::Text(format!("{kind:?}")),
            );
            out.insert(
                "run.exit_code".to_string(),
                ReportValue::U64(kind.exit_code() as u64),
            );
        }
        if let Some(message) = &self.error_message {
            out.insert(
                "run.error_message".to_string(),
                ReportValue::Text(message.clone()),
            );
        }

        for stage in &self.stages {
            let prefix = format!("stage.{}", stage.name);
            out.insert(
                format!("{prefix}.items_completed"),
                ReportValue::U64(stage.items_completed as u64),
            );
            out.insert(
                format!("{prefix}.items_failed"),
                ReportValue::U64(stage.items_failed as u64),
            );
            out.insert(format!("{prefix}.busy"), ReportValue::Duration(stage.busy));
        }

        out
    }
}

/// Accumulates run facts as they become known.
#[derive(Debug, Clone)]
pub struct RunReportBuilder {
    report: RunReport,
}

impl RunReportBuilder {
    pub fn new(mode: Mode, input_path: &Path, output_path: &Path) -> Self {
        Self {
            report: RunReport {
                mode,
                error: None,
                error_message: None,
                input_path: input_path.to_path_buf(),
                input_len: 0,
                output_path: output_path.to_path_buf(),
                output_len: 0,
                elapsed: Duration::ZERO,
                chunks: 0,
                stages: Vec::new(),
            },
        }
    }

    pub fn input_len(&mut self, len: u64) -> &mut Self {
        self.report.input_len = len;
        self
    }

    pub fn output_len(&mut self, len: u64) -> &mut Self {
        self.report.output_len = len;
        self
    }

    pub fn chunks(&mut self, chunks: u64) -> &mut Self {
        self.report.chunks = chunks;
        self
    }

    pub fn stages(&mut self, stages: &[StageRuntimeSnapshot]) -> &mut Self {
        self.report.stages = stages.iter().map(StageReport::from_runtime).collect();
        self
    }

    pub fn error(&mut self, error: &IbzError) -> &mut Self {
        self.report.error = Some(error.kind());
        self.report.error_message = Some(error.to_string());
        self
    }

    pub fn elapsed(&mut self, elapsed: Duration) -> &mut Self {
        self.report.elapsed = elapsed;
        self
    }

    pub fn build(self) -> RunReport {
        self.report
    }
}

/// Formats a duration as `hh:mm:ss.fffffff`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;
    let ticks = elapsed.subsec_nanos() / 100;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{ticks:07}")
}
