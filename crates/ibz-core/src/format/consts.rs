/// Magic bytes at the start of every compressed container.
pub const SIGNATURE: [u8; 4] = *b"ib.z";

/// Size of a record header: int64 offset followed by int32 payload length.
pub const RECORD_HEADER_SIZE: usize = 12;

/// Size of the plain blocks read from the source while compressing.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Default gzip level used for every block.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
