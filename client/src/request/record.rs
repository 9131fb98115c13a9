use depot_shared::FileKey;

use crate::archive::ArchiveHandle;

/// One pending or in-flight file request.
pub struct RequestRecord {
    pub key: FileKey,
    /// Checksum the completed body must match.
    pub expected_crc: u32,
    /// Trailing workspace bytes the archive store wants appended to the
    /// assembly buffer. Not part of the body and excluded from the checksum.
    pub padding: u8,
    /// Destination for the completed file. `None` only for the
    /// checksum-table request, which is consumed by the session itself.
    pub archive: Option<ArchiveHandle>,
}
