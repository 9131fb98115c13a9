use depot_shared::{Arena, ArchiveIndexId, FileId, FileKey, IntrusiveIndex, OrderedQueue, Priority};

use crate::archive::ArchiveHandle;
use crate::connection::config::SessionConfig;
use crate::request::record::RequestRecord;

/// Owns every request the caller has submitted but the peer has not yet
/// answered. Requests live in one of four collections — two priority classes,
/// each split into pending-to-send and in-flight — all backed by the shared
/// arena. Standard-priority pending requests additionally thread through a
/// FIFO order queue, which decides transmission order; High-priority requests
/// bypass the queue entirely.
pub struct RequestScheduler {
    arena: Arena<RequestRecord>,
    high_pending: IntrusiveIndex,
    high_in_flight: IntrusiveIndex,
    standard_pending: IntrusiveIndex,
    standard_in_flight: IntrusiveIndex,
    send_order: OrderedQueue,
}

impl RequestScheduler {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            arena: Arena::new(),
            high_pending: IntrusiveIndex::with_buckets(config.pending_buckets),
            high_in_flight: IntrusiveIndex::with_buckets(config.in_flight_buckets),
            standard_pending: IntrusiveIndex::with_buckets(config.pending_buckets),
            standard_in_flight: IntrusiveIndex::with_buckets(config.in_flight_buckets),
            send_order: OrderedQueue::new(),
        }
    }

    pub fn pending_count(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high_pending.len(),
            Priority::Standard => self.standard_pending.len(),
        }
    }

    pub fn in_flight_count(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high_in_flight.len(),
            Priority::Standard => self.standard_in_flight.len(),
        }
    }

    /// True when nothing is pending or in flight in either class.
    pub fn is_idle(&self) -> bool {
        self.high_pending.is_empty()
            && self.high_in_flight.is_empty()
            && self.standard_pending.is_empty()
            && self.standard_in_flight.is_empty()
    }

    /// Accept a file request. Duplicate keys are coalesced: a key already
    /// pending or in flight is left alone, except that a High-priority
    /// enqueue finding the key in Standard-pending *promotes* it — the record
    /// moves to High-pending and loses its queue position. A High-priority
    /// enqueue for a key that is only Standard-in-flight deliberately creates
    /// a second outstanding request; the two responses are consumed
    /// independently.
    pub fn enqueue(
        &mut self,
        priority: Priority,
        archive_index: ArchiveIndexId,
        file: FileId,
        expected_crc: u32,
        padding: u8,
        archive: Option<ArchiveHandle>,
    ) {
        let file_key = FileKey::new(archive_index, file);
        let key = file_key.as_u64();

        if self.high_pending.get(&self.arena, key).is_some() {
            return;
        }
        if self.high_in_flight.get(&self.arena, key).is_some() {
            return;
        }
        if let Some(id) = self.standard_pending.get(&self.arena, key) {
            if priority.is_high() {
                self.standard_pending.remove(&mut self.arena, id);
                self.send_order.remove(&mut self.arena, id);
                self.high_pending.put(&mut self.arena, key, id);
            }
            return;
        }
        if !priority.is_high() && self.standard_in_flight.get(&self.arena, key).is_some() {
            return;
        }

        let id = self.arena.insert(RequestRecord {
            key: file_key,
            expected_crc,
            padding,
            archive,
        });
        match priority {
            Priority::High => self.high_pending.put(&mut self.arena, key, id),
            Priority::Standard => {
                self.standard_pending.put(&mut self.arena, key, id);
                self.send_order.push_back(&mut self.arena, id);
            }
        }
    }

    /// Move an already-queued Standard request to the front of the send
    /// order without promoting it. Unknown or already-sent keys are ignored.
    pub fn requeue_to_front(&mut self, archive_index: ArchiveIndexId, file: FileId) {
        let key = FileKey::new(archive_index, file).as_u64();
        if let Some(id) = self.standard_pending.get(&self.arena, key) {
            self.send_order.remove(&mut self.arena, id);
            self.send_order.push_front(&mut self.arena, id);
        }
    }

    /// Move pending requests into their in-flight collections, up to the free
    /// slots under each class's cap, appending one `(priority, key)` entry per
    /// request in exactly the order the wire messages must be transmitted.
    pub fn drain_sendable(
        &mut self,
        max_high_in_flight: usize,
        max_standard_in_flight: usize,
        out: &mut Vec<(Priority, FileKey)>,
    ) {
        while self.high_in_flight.len() < max_high_in_flight {
            let Some(id) = self.high_pending.pop_oldest(&mut self.arena) else {
                break;
            };
            let Some(record) = self.arena.get(id) else {
                break;
            };
            let key = record.key;
            self.high_in_flight.put(&mut self.arena, key.as_u64(), id);
            out.push((Priority::High, key));
        }

        while self.standard_in_flight.len() < max_standard_in_flight {
            let Some(id) = self.send_order.pop_front(&mut self.arena) else {
                break;
            };
            self.standard_pending.remove(&mut self.arena, id);
            let Some(record) = self.arena.get(id) else {
                break;
            };
            let key = record.key;
            self.standard_in_flight.put(&mut self.arena, key.as_u64(), id);
            out.push((Priority::Standard, key));
        }
    }

    /// Find the in-flight record a response header refers to. High priority
    /// wins when the same key is outstanding in both classes.
    pub fn lookup_in_flight(&self, key: FileKey) -> Option<(Priority, &RequestRecord)> {
        if let Some(id) = self.high_in_flight.get(&self.arena, key.as_u64()) {
            return self.arena.get(id).map(|record| (Priority::High, record));
        }
        if let Some(id) = self.standard_in_flight.get(&self.arena, key.as_u64()) {
            return self.arena.get(id).map(|record| (Priority::Standard, record));
        }
        None
    }

    /// Retire an in-flight request once its response has been consumed.
    pub fn complete(&mut self, priority: Priority, key: FileKey) {
        let index = match priority {
            Priority::High => &mut self.high_in_flight,
            Priority::Standard => &mut self.standard_in_flight,
        };
        if let Some(id) = index.get(&self.arena, key.as_u64()) {
            index.remove(&mut self.arena, id);
            self.arena.remove(id);
        }
    }

    /// A fresh connection has no memory of prior requests: move every
    /// in-flight record back to pending so it is resent. Standard records are
    /// front-appended to the send order ahead of anything still queued,
    /// oldest first, preserving their relative order. Calling this twice in a
    /// row is a no-op the second time.
    pub fn reset_for_reconnect(&mut self) {
        while let Some(id) = self.high_in_flight.pop_oldest(&mut self.arena) {
            let Some(record) = self.arena.get(id) else {
                continue;
            };
            let key = record.key.as_u64();
            self.high_pending.put(&mut self.arena, key, id);
        }

        let mut resend = Vec::new();
        while let Some(id) = self.standard_in_flight.pop_oldest(&mut self.arena) {
            resend.push(id);
        }
        for &id in resend.iter().rev() {
            let Some(record) = self.arena.get(id) else {
                continue;
            };
            let key = record.key.as_u64();
            self.standard_pending.put(&mut self.arena, key, id);
            self.send_order.push_front(&mut self.arena, id);
        }
    }
}
