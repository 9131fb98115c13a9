use std::rc::Rc;

use depot_shared::{ArchiveIndexId, FileId};

/// The local cache that ultimately receives synchronized files. Decompression
/// and persistence are its responsibility, not the client's.
pub trait ArchiveStore {
    /// A fully received and verified file. `bytes` is the raw assembly
    /// buffer: compression method, size, body, and the trailing padding
    /// workspace the store asked for when enqueueing the request.
    fn deliver_file(&self, archive: ArchiveIndexId, file: FileId, high_priority: bool, bytes: Vec<u8>);

    /// The latest known checksum for one archive index, extracted from the
    /// peer's checksum table.
    fn notify_latest_version(&self, archive: ArchiveIndexId, checksum: u32);
}

/// Shared reference to an archive store. The engine is single-threaded, so a
/// plain `Rc` is enough; stores needing mutation use interior mutability.
pub type ArchiveHandle = Rc<dyn ArchiveStore>;
