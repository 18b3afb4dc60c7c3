use serde::{Deserialize, Serialize};

use crate::format::{DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION_LEVEL};

/// Number of in-flight items each stage admits by default.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Construction config for a compression pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of parallel transform workers.
    pub workers: usize,
    /// Items admitted per stage before producers block.
    pub queue_capacity: usize,
    /// Size of plain blocks read from the source when compressing.
    pub block_size: usize,
    /// Gzip level, 0 (store) through 9 (best).
    pub compression_level: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            block_size: DEFAULT_BLOCK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Returns a copy with every knob clamped into its valid range.
    pub fn normalized(&self) -> Self {
        Self {
            workers: self.workers.max(1),
            queue_capacity: self.queue_capacity.max(1),
            block_size: self.block_size.max(1),
            compression_level: self.compression_level.min(9),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_machine_and_format() {
        let config = PipelineConfig::default();
        assert_eq!(config.workers, num_cpus::get().max(1));
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.block_size, 8192);
        assert_eq!(config.compression_level, 6);
    }

    #[test]
    fn zero_values_clamp_to_one() {
        let config = PipelineConfig::default()
            .with_workers(0)
            .with_queue_capacity(0)
            .with_block_size(0)
            .with_compression_level(42);
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.block_size, 1);
        assert_eq!(config.compression_level, 9);
    }
}
