use std::cell::RefCell;
use std::rc::Rc;

use depot_client::ArchiveStore;

/// One completed file as the archive store received it.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub archive: u8,
    pub file: u16,
    pub high_priority: bool,
    pub bytes: Vec<u8>,
}

/// Archive store that records everything the session hands it.
#[derive(Default)]
pub struct RecordingArchive {
    deliveries: RefCell<Vec<Delivery>>,
    versions: RefCell<Vec<(u8, u32)>>,
}

impl RecordingArchive {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.borrow().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.borrow().len()
    }

    /// `(archive_index, checksum)` pairs from `notify_latest_version`.
    pub fn versions(&self) -> Vec<(u8, u32)> {
        self.versions.borrow().clone()
    }
}

impl ArchiveStore for RecordingArchive {
    fn deliver_file(&self, archive: u8, file: u16, high_priority: bool, bytes: Vec<u8>) {
        self.deliveries.borrow_mut().push(Delivery {
            archive,
            file,
            high_priority,
            bytes,
        });
    }

    fn notify_latest_version(&self, archive: u8, checksum: u32) {
        self.versions.borrow_mut().push((archive, checksum));
    }
}
