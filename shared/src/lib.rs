//! # Depot Shared
//! Common functionality shared between the depot-client & depot-test crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_cursor;
mod constants;
mod intrusive;
mod types;

pub use byte_cursor::{ByteCursor, CursorError};
pub use constants::{
    ARCHIVE_INDEX_COUNT, BLOCK_LENGTH, CHECKSUM_TABLE_BASE_OFFSET, CHECKSUM_TABLE_KEY,
    CONTINUATION_MARKER, MAX_IN_FLIGHT, REQUEST_MESSAGE_LENGTH, RESPONSE_HEADER_LENGTH,
};
pub use intrusive::{Arena, IntrusiveIndex, OrderedQueue, SlotId};
pub use types::{ArchiveIndexId, FileId, FileKey, Priority};
