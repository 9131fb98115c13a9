use std::time::{Duration, Instant};

use log::{info, trace, warn};

use depot_shared::{
    ArchiveIndexId, FileId, FileKey, Priority, ARCHIVE_INDEX_COUNT, CHECKSUM_TABLE_BASE_OFFSET,
    CHECKSUM_TABLE_KEY,
};

use crate::archive::ArchiveHandle;
use crate::connection::config::SessionConfig;
use crate::connection::error::FatalError;
use crate::connection::opcode::{encode_file_request, encode_key_announcement, encode_login_state};
use crate::connection::reassembler::{InProgress, PumpEvent, StreamReassembler};
use crate::request::scheduler::RequestScheduler;
use crate::transport::{Transport, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// The session made progress (or had nothing to do).
    Connected,
    /// The session has no usable transport; the caller must attach a fresh
    /// one, after which every outstanding request is resent.
    Disconnected,
}

/// The synchronization engine. One caller thread drives it with repeated
/// non-blocking [`poll`](SyncSession::poll) calls: each tick transmits
/// request messages up to the in-flight caps, pumps available transport
/// bytes through the reassembler, verifies completed files, and delivers
/// them to their archive stores.
pub struct SyncSession {
    config: SessionConfig,
    scheduler: RequestScheduler,
    reassembler: StreamReassembler,
    transport: Option<Box<dyn Transport>>,
    /// Single-byte XOR key for all traffic. 0 disables encryption; rotated
    /// to a random non-zero byte whenever a checksum mismatch kills the
    /// connection, so the reattached session negotiates fresh state.
    cipher: u8,
    /// Time accumulated since the last inbound byte, clamped per poll.
    stall_clock: Duration,
    last_poll: Option<Instant>,
    /// The checksum-table file, kept verbatim once fetched. Survives
    /// reconnects; only holds previously verified data.
    checksum_table: Option<Vec<u8>>,
    /// Archive stores awaiting a checksum out of the table, by archive index.
    archive_loaders: Box<[Option<ArchiveHandle>]>,
    io_failure_count: u32,
    corruption_count: u32,
    send_scratch: Vec<(Priority, FileKey)>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            scheduler: RequestScheduler::new(&config),
            reassembler: StreamReassembler::new(),
            transport: None,
            cipher: 0,
            stall_clock: Duration::ZERO,
            last_poll: None,
            checksum_table: None,
            archive_loaders: (0..ARCHIVE_INDEX_COUNT).map(|_| None).collect(),
            io_failure_count: 0,
            corruption_count: 0,
            send_scratch: Vec::new(),
            config,
        }
    }

    /// Hand the session a freshly opened transport. Any previous transport is
    /// closed, all in-flight requests return to pending for resend, assembly
    /// state is discarded, and the peer is told the login state — plus the
    /// current encryption key, if one is active.
    pub fn attach(&mut self, transport: Box<dyn Transport>, authenticated: bool) {
        if let Some(mut old) = self.transport.take() {
            old.close();
        }
        self.transport = Some(transport);
        info!("transport attached (authenticated: {authenticated})");

        self.reassembler.reset();
        self.scheduler.reset_for_reconnect();

        if self.try_send(&encode_login_state(authenticated)) && self.cipher != 0 {
            self.try_send(&encode_key_announcement(self.cipher));
        }

        self.stall_clock = Duration::ZERO;
        self.last_poll = None;
    }

    /// Re-announce the login state mid-session (for example after the caller
    /// authenticates). No-op while detached.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        if self.transport.is_some() {
            self.try_send(&encode_login_state(authenticated));
        }
    }

    /// Drive the engine one tick using the wall clock.
    pub fn poll(&mut self) -> SessionStatus {
        self.poll_at(Instant::now())
    }

    /// Drive the engine one tick at an explicit instant. Callers with their
    /// own clock (and tests) use this directly; `poll` is the convenience
    /// wrapper.
    pub fn poll_at(&mut self, now: Instant) -> SessionStatus {
        let elapsed = match self.last_poll {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last_poll = Some(now);
        self.stall_clock += elapsed.min(self.config.tick_clamp);

        if self.scheduler.is_idle() {
            return SessionStatus::Connected;
        }
        if self.transport.is_none() {
            return SessionStatus::Disconnected;
        }

        match self.tick() {
            Ok(()) => SessionStatus::Connected,
            Err(error) => {
                self.handle_fatal(error);
                SessionStatus::Disconnected
            }
        }
    }

    /// Shut the connection down. Outstanding requests stay queued and are
    /// resent after the next attach.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    /// Submit a file request. Duplicates coalesce; a High-priority request
    /// for a key already queued as Standard promotes it.
    pub fn enqueue_file_request(
        &mut self,
        priority: Priority,
        archive_index: ArchiveIndexId,
        file: FileId,
        padding: u8,
        expected_crc: u32,
        archive: ArchiveHandle,
    ) {
        self.scheduler
            .enqueue(priority, archive_index, file, expected_crc, padding, Some(archive));
    }

    /// Expedite an already-queued Standard request to the front of the send
    /// order without promoting it.
    pub fn requeue_to_front(&mut self, archive_index: ArchiveIndexId, file: FileId) {
        self.scheduler.requeue_to_front(archive_index, file);
    }

    /// Ask for one archive's latest checksum. Answered synchronously from the
    /// cached checksum table when available; otherwise the table file is
    /// requested at High priority and the store is notified on completion.
    pub fn request_checksum_table(&mut self, archive: ArchiveHandle, archive_index: ArchiveIndexId) {
        if let Some(table) = &self.checksum_table {
            let offset = CHECKSUM_TABLE_BASE_OFFSET + 4 * archive_index as usize;
            if let Some(bytes) = table.get(offset..offset + 4) {
                let checksum = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                archive.notify_latest_version(archive_index, checksum);
            } else {
                warn!("checksum table is too short for archive index {archive_index}");
            }
        } else {
            self.scheduler.enqueue(
                Priority::High,
                CHECKSUM_TABLE_KEY.archive(),
                CHECKSUM_TABLE_KEY.file(),
                0,
                0,
                None,
            );
            self.archive_loaders[archive_index as usize] = Some(archive);
        }
    }

    /// Download progress of one file, 0–100. Returns 0 unless the given key
    /// is the response currently being assembled; at least 1 from the moment
    /// assembly starts, exactly 100 only at completion.
    pub fn connection_progress(&self, archive_index: ArchiveIndexId, file: FileId) -> u8 {
        let key = FileKey::new(archive_index, file);
        match self.reassembler.in_progress() {
            Some(response) if response.key == key => {
                (1 + response.buffer.position() * 99 / response.body_len()) as u8
            }
            _ => 0,
        }
    }

    /// Number of requests not yet completed in the selected priority classes.
    pub fn active_task_count(&self, include_standard: bool, include_high: bool) -> usize {
        let mut total = 0;
        if include_high {
            total += self.scheduler.pending_count(Priority::High)
                + self.scheduler.in_flight_count(Priority::High);
        }
        if include_standard {
            total += self.scheduler.pending_count(Priority::Standard)
                + self.scheduler.in_flight_count(Priority::Standard);
        }
        total
    }

    /// Connections lost to plain I/O failure since the last delivery.
    pub fn io_failure_count(&self) -> u32 {
        self.io_failure_count
    }

    /// Connections lost to checksum mismatch since the last delivery.
    pub fn corruption_count(&self) -> u32 {
        self.corruption_count
    }

    /// Responses abandoned on a bad continuation marker, across the life of
    /// the session.
    pub fn desync_count(&self) -> u64 {
        self.reassembler.desync_count()
    }

    /// The active XOR key. 0 means encryption is disabled.
    pub fn encryption_key(&self) -> u8 {
        self.cipher
    }

    fn tick(&mut self) -> Result<(), FatalError> {
        if self.stall_clock > self.config.stall_timeout {
            return Err(FatalError::Stalled {
                elapsed_ms: self.stall_clock.as_millis() as u64,
            });
        }

        // send phase: one 4-byte message per newly in-flight request
        self.send_scratch.clear();
        let max_in_flight = self.config.max_in_flight;
        self.scheduler
            .drain_sendable(max_in_flight, max_in_flight, &mut self.send_scratch);
        for index in 0..self.send_scratch.len() {
            let (priority, key) = self.send_scratch[index];
            self.send_raw(&encode_file_request(priority, key))?;
        }

        // receive phase: pump available bytes, bounded per tick
        for _ in 0..self.config.pump_budget {
            let event = {
                let Some(transport) = self.transport.as_mut() else {
                    return Err(TransportError::Closed.into());
                };
                self.reassembler
                    .pump_once(transport.as_mut(), &self.scheduler, self.cipher)?
            };
            match event {
                PumpEvent::NoData => break,
                PumpEvent::Consumed => self.stall_clock = Duration::ZERO,
                PumpEvent::Complete(response) => {
                    self.stall_clock = Duration::ZERO;
                    self.finish_response(response)?;
                }
            }
        }
        Ok(())
    }

    fn finish_response(&mut self, response: InProgress) -> Result<(), FatalError> {
        let key = response.key;
        let priority = response.priority;

        if key == CHECKSUM_TABLE_KEY {
            let table = response.buffer.into_vec();
            for archive_index in 0..ARCHIVE_INDEX_COUNT {
                let Some(handle) = &self.archive_loaders[archive_index] else {
                    continue;
                };
                let offset = CHECKSUM_TABLE_BASE_OFFSET + 4 * archive_index;
                match table.get(offset..offset + 4) {
                    Some(bytes) => {
                        let checksum =
                            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        handle.notify_latest_version(archive_index as ArchiveIndexId, checksum);
                    }
                    None => {
                        warn!("checksum table is too short for archive index {archive_index}")
                    }
                }
            }
            self.checksum_table = Some(table);
        } else {
            let body_len = response.body_len();
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&response.buffer.as_slice()[..body_len]);
            let computed = hasher.finalize();
            if computed != response.expected_crc {
                return Err(FatalError::ChecksumMismatch {
                    archive: key.archive(),
                    file: key.file(),
                    expected: response.expected_crc,
                    computed,
                });
            }

            self.io_failure_count = 0;
            self.corruption_count = 0;
            trace!(
                "delivering archive {}, file {} ({} bytes)",
                key.archive(),
                key.file(),
                body_len
            );
            if let Some(handle) = response.archive {
                handle.deliver_file(
                    key.archive(),
                    key.file(),
                    priority.is_high(),
                    response.buffer.into_vec(),
                );
            }
        }

        self.scheduler.complete(priority, key);
        Ok(())
    }

    fn send_raw(&mut self, payload: &[u8]) -> Result<(), FatalError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(TransportError::Closed.into());
        };
        transport.send(payload).map_err(FatalError::from)
    }

    /// Send during attach: a failure tears the connection down on the spot
    /// instead of propagating, mirroring the fatal path of `poll`.
    fn try_send(&mut self, payload: &[u8]) -> bool {
        match self.send_raw(payload) {
            Ok(()) => true,
            Err(error) => {
                self.handle_fatal(error);
                false
            }
        }
    }

    fn handle_fatal(&mut self, error: FatalError) {
        warn!("sync session failed: {error}");
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        if error.is_integrity_failure() {
            self.corruption_count += 1;
            self.cipher = fastrand::u8(1..);
        } else {
            self.io_failure_count += 1;
        }
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}
