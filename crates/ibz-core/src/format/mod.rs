//! Container format: signature, self-describing records and block readers.
//!
//! A container is [`SIGNATURE`] followed by records in arbitrary order. Each
//! record carries the absolute offset of its block in the uncompressed stream,
//! so records can be written in completion order and still restore the
//! original layout.

pub mod codec;
mod consts;
mod reader;
mod record;
mod signature;

pub use codec::{compress_chunk, decompress_chunk};
pub use consts::{DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION_LEVEL, RECORD_HEADER_SIZE, SIGNATURE};
pub use reader::{BlockReader, ChunkSource, RecordReader};
pub use record::{RecordHeader, write_at, write_record};
pub use signature::{verify_signature, write_signature};
