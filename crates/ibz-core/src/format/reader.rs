use std::io::{self, Read};

use crate::error::IbzError;
use crate::telemetry::tags;
use crate::types::{Chunk, Result};

use super::{RECORD_HEADER_SIZE, RecordHeader, SIGNATURE, verify_signature};

// Upper bound on the buffer reserved up front for a record payload, so a
// corrupt length field cannot force a huge allocation before any data arrives.
const MAX_PAYLOAD_PREALLOC: usize = 1 << 20;

/// Stream of chunks that knows how much of its input it has consumed.
pub trait ChunkSource: Iterator<Item = Result<Chunk>> {
    fn consumed(&self) -> u64;
}

/// Iterates the records of a container, yielding compressed chunks.
///
/// A clean end of input at a record boundary ends the iteration. Input ending
/// inside a record yields [`IbzError::TruncatedRecord`] once, then stops.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    reader: R,
    consumed: u64,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    /// Verifies the container signature and positions the reader on the first record.
    pub fn open(mut reader: R) -> Result<Self> {
        verify_signature(&mut reader)?;
        Ok(Self {
            reader,
            consumed: SIGNATURE.len() as u64,
            done: false,
        })
    }

    fn read_record(&mut self) -> Result<Option<Chunk>> {
        let record_start = self.consumed;
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let filled = read_full(&mut self.reader, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < RECORD_HEADER_SIZE {
            return Err(IbzError::TruncatedRecord {
                offset: record_start,
            });
        }

        let header = RecordHeader::from_bytes(header)
            .map_err(|error| error.with_context(format!("record at offset {record_start}")))?;
        let length = header.length as usize;
        let mut payload = Vec::with_capacity(length.min(MAX_PAYLOAD_PREALLOC));
        (&mut self.reader)
            .take(header.length as u64)
            .read_to_end(&mut payload)?;
        if payload.len() < length {
            return Err(IbzError::TruncatedRecord {
                offset: record_start,
            });
        }

        self.consumed += (RECORD_HEADER_SIZE + length) as u64;
        let chunk = Chunk::new(header.offset, payload)
            .map_err(|error| error.with_context(format!("record at offset {record_start}")))?;
        Ok(Some(chunk))
    }
}

impl<R: Read> ChunkSource for RecordReader<R> {
    /// Container bytes consumed so far, signature included.
    fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                tracing::debug!(target: tags::TARGET_FORMAT, consumed = self.consumed, error = %error, "record read failed");
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

/// Splits a plain stream into fixed-size chunks labelled with their offset.
///
/// Every chunk but the last is exactly `block_size` bytes long.
#[derive(Debug)]
pub struct BlockReader<R: Read> {
    reader: R,
    block_size: usize,
    position: u64,
    done: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(reader: R, block_size: usize) -> Self {
        Self {
            reader,
            block_size: block_size.max(1),
            position: 0,
            done: false,
        }
    }

    fn read_block(&mut self) -> Result<Option<Chunk>> {
        let mut block = vec![0u8; self.block_size];
        let filled = read_full(&mut self.reader, &mut block)?;
        if filled == 0 {
            return Ok(None);
        }

        block.truncate(filled);
        let chunk = Chunk::new(self.position, block)?;
        self.position += filled as u64;
        Ok(Some(chunk))
    }
}

impl<R: Read> ChunkSource for BlockReader<R> {
    fn consumed(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let next = self.read_block().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Reads until `buffer` is full or the input ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}
