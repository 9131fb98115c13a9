use crate::types::FileKey;

/// Length in bytes of one response body block on the wire.
pub const BLOCK_LENGTH: usize = 512;

/// Marker byte expected after every full block except possibly the last.
/// Any other value abandons the in-progress response.
pub const CONTINUATION_MARKER: u8 = 0xff;

/// Length in bytes of a response header
/// (archive index, file id, compression method, size).
pub const RESPONSE_HEADER_LENGTH: usize = 8;

/// Length in bytes of every outbound request message.
pub const REQUEST_MESSAGE_LENGTH: usize = 4;

/// Per-priority-class cap on requests transmitted but not yet answered.
pub const MAX_IN_FLIGHT: usize = 20;

/// Reserved key addressing the checksum-table catalog file.
pub const CHECKSUM_TABLE_KEY: FileKey = FileKey::new(255, 255);

/// Byte offset of the first per-archive checksum within the table file.
pub const CHECKSUM_TABLE_BASE_OFFSET: usize = 5;

/// Number of addressable archive indexes.
pub const ARCHIVE_INDEX_COUNT: usize = 256;
