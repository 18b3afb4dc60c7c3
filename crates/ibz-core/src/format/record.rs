use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::IbzError;
use crate::types::{Chunk, Result};

use super::RECORD_HEADER_SIZE;

/// Header preceding each compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Offset of the block in the uncompressed stream.
    pub offset: u64,
    /// Length of the compressed payload that follows.
    pub length: u32,
}

impl RecordHeader {
    pub fn for_chunk(chunk: &Chunk) -> Result<Self> {
        let length = u32::try_from(chunk.len())
            .ok()
            .filter(|length| *length <= i32::MAX as u32)
            .ok_or(IbzError::InvalidArgument(
                "record payload exceeds the int32 range",
            ))?;

        Ok(Self {
            offset: chunk.position(),
            length,
        })
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut bytes = [0u8; RECORD_HEADER_SIZE];
        bytes[..8].copy_from_slice(&(self.offset as i64).to_le_bytes());
        bytes[8..12].copy_from_slice(&(self.length as i32).to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; RECORD_HEADER_SIZE]) -> Result<Self> {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[..8]);
        let offset = i64::from_le_bytes(offset);
        let length = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let offset = u64::try_from(offset)
            .map_err(|_| IbzError::CorruptRecord("negative record offset"))?;
        let length = u32::try_from(length)
            .map_err(|_| IbzError::CorruptRecord("negative record length"))?;

        Ok(Self { offset, length })
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; RECORD_HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        Self::from_bytes(bytes)
    }
}

/// Appends `chunk` as one self-describing record.
///
/// Returns the number of bytes written.
pub fn write_record<W: Write>(writer: &mut W, chunk: &Chunk) -> Result<u64> {
    let header = RecordHeader::for_chunk(chunk)?;
    writer.write_all(&header.to_bytes())?;
    writer.write_all(chunk.data())?;
    Ok((RECORD_HEADER_SIZE + chunk.len()) as u64)
}

/// Writes `chunk` at its absolute position, extending the sink as needed.
pub fn write_at<W: Write + Seek>(writer: &mut W, chunk: &Chunk) -> Result<()> {
    writer.seek(SeekFrom::Start(chunk.position()))?;
    writer.write_all(chunk.data())?;
    Ok(())
}
