use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::IbzError;

pub type Result<T> = std::result::Result<T, IbzError>;

/// A unit of work flowing between pipeline stages.
///
/// `position` is always an offset into the *uncompressed* stream, so a chunk
/// keeps its position when its payload is compressed or decompressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    position: u64,
    data: Bytes,
}

impl Chunk {
    /// Creates a chunk.
    ///
    /// # Arguments
    /// * `position` - Absolute offset of the payload in the uncompressed stream
    /// * `data` - Payload bytes; must not be empty
    pub fn new(position: u64, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(IbzError::InvalidArgument("chunk payload cannot be empty"));
        }
        if position > i64::MAX as u64 {
            return Err(IbzError::InvalidArgument(
                "chunk position exceeds the int64 range",
            ));
        }

        Ok(Self { position, data })
    }

    /// Returns a chunk at the same position carrying `data`.
    pub fn with_data(&self, data: impl Into<Bytes>) -> Result<Self> {
        Self::new(self.position, data)
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.position.saturating_add(self.data.len() as u64)
    }
}

/// Direction of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Compress,
    Decompress,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Compress => "compressed",
            Self::Decompress => "decompressed",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = IbzError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compress" => Ok(Self::Compress),
            "decompress" => Ok(Self::Decompress),
            _ => Err(IbzError::InvalidArgument(
                "mode must be `compress` or `decompress`",
            )),
        }
    }
}

pub(crate) fn duration_to_us(duration: std::time::Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_rejects_empty_payload() {
        assert!(matches!(
            Chunk::new(0, Vec::new()),
            Err(IbzError::InvalidArgument(_))
        ));
    }

    #[test]
    fn transformed_chunk_keeps_position() -> Result<()> {
        let chunk = Chunk::new(8192, vec![1u8, 2, 3])?;
        let next = chunk.with_data(vec![9u8])?;
        assert_eq!(next.position(), 8192);
        assert_eq!(next.data(), &[9u8]);
        assert_eq!(chunk.end(), 8195);
        Ok(())
    }

    #[test]
    fn mode_parses_case_insensitively() -> Result<()> {
        assert_eq!("Compress".parse::<Mode>()?, Mode::Compress);
        assert_eq!("DECOMPRESS".parse::<Mode>()?, Mode::Decompress);
        assert!("zip".parse::<Mode>().is_err());
        Ok(())
    }
}
