use depot_shared::CursorError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors that terminate the connection. The session closes the transport
/// and reports `Disconnected`; the caller is expected to attach a fresh
/// transport, at which point every outstanding request is resent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// The transport failed or reported a closed stream
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A response header referenced a key with no matching in-flight request.
    /// The stream can no longer be trusted to be frame-aligned.
    #[error("response header references unknown in-flight key (archive {archive}, file {file})")]
    UnknownResponseKey { archive: u8, file: u16 },

    /// A completed body did not match the checksum the caller supplied.
    /// Likely a desynced cipher stream; the session rotates its key.
    #[error(
        "checksum mismatch for archive {archive}, file {file}: expected {expected:#010x}, computed {computed:#010x}"
    )]
    ChecksumMismatch {
        archive: u8,
        file: u16,
        expected: u32,
        computed: u32,
    },

    /// No inbound byte arrived within the stall timeout
    #[error("connection stalled: no data for {elapsed_ms} ms")]
    Stalled { elapsed_ms: u64 },

    /// An assembly buffer access ran out of bounds (malformed size fields)
    #[error("assembly buffer error: {0}")]
    Cursor(#[from] CursorError),
}

impl FatalError {
    /// Integrity failures rotate the encryption key on teardown; every other
    /// fatal error counts as a plain I/O failure.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, FatalError::ChecksumMismatch { .. })
    }
}
