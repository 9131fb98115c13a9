use log::warn;

use depot_shared::{
    ByteCursor, FileKey, Priority, BLOCK_LENGTH, CONTINUATION_MARKER, RESPONSE_HEADER_LENGTH,
};

use crate::archive::ArchiveHandle;
use crate::connection::error::FatalError;
use crate::request::scheduler::RequestScheduler;
use crate::transport::Transport;

/// A response currently being assembled, with everything copied out of its
/// request record that completion will need.
pub(crate) struct InProgress {
    pub key: FileKey,
    pub priority: Priority,
    pub padding: u8,
    pub expected_crc: u32,
    pub archive: Option<ArchiveHandle>,
    pub buffer: ByteCursor,
}

impl InProgress {
    /// Logical body length: the assembly buffer minus the trailing padding
    /// workspace. The cursor position reaches this exactly at completion.
    pub fn body_len(&self) -> usize {
        self.buffer.len() - self.padding as usize
    }
}

pub(crate) enum PumpEvent {
    /// The transport has no bytes; yield back to the caller.
    NoData,
    /// Bytes were consumed but the current unit is still incomplete.
    Consumed,
    /// A full response has been assembled.
    Complete(InProgress),
}

/// Turns the peer's raw reply stream — 8-byte headers, 512-byte body blocks,
/// continuation markers — into completed file buffers, one response at a
/// time, across as many polls as the bytes take to arrive. Each inbound byte
/// is XOR-decrypted in place when the session key is active.
pub(crate) struct StreamReassembler {
    /// Staging for the fixed-size units (header, marker). Survives across
    /// polls so a header split over several reads accumulates here.
    scratch: ByteCursor,
    response: Option<InProgress>,
    /// Offset within the current 512-byte block. 0 means the next unit is a
    /// continuation marker (or, with no response, a header).
    block_offset: usize,
    desync_count: u64,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self {
            scratch: ByteCursor::fixed(RESPONSE_HEADER_LENGTH),
            response: None,
            block_offset: 0,
            desync_count: 0,
        }
    }

    /// Discard all in-progress assembly state. Called on every attach; the
    /// desync counter deliberately survives, it spans connections.
    pub fn reset(&mut self) {
        self.scratch.set_position(0);
        self.response = None;
        self.block_offset = 0;
    }

    pub fn in_progress(&self) -> Option<&InProgress> {
        self.response.as_ref()
    }

    pub fn desync_count(&self) -> u64 {
        self.desync_count
    }

    /// Consume at most one logical unit from the transport. Returns `NoData`
    /// when the stream has nothing available, so the caller can stop pumping
    /// this tick.
    pub fn pump_once(
        &mut self,
        transport: &mut dyn Transport,
        scheduler: &RequestScheduler,
        cipher: u8,
    ) -> Result<PumpEvent, FatalError> {
        let available = transport.bytes_available()?;
        if available == 0 {
            return Ok(PumpEvent::NoData);
        }

        match self.response.take() {
            None => self.read_header(transport, available, scheduler, cipher),
            Some(response) if self.block_offset == 0 => {
                self.read_marker(transport, cipher, response)
            }
            Some(response) => self.read_body(transport, available, cipher, response),
        }
    }

    fn read_header(
        &mut self,
        transport: &mut dyn Transport,
        available: usize,
        scheduler: &RequestScheduler,
        cipher: u8,
    ) -> Result<PumpEvent, FatalError> {
        let wanted = RESPONSE_HEADER_LENGTH - self.scratch.position();
        let count = wanted.min(available);
        let window = self.scratch.window_mut(count)?;
        transport.read_into(window)?;
        decrypt(window, cipher);
        self.scratch.advance(count)?;
        if self.scratch.position() < RESPONSE_HEADER_LENGTH {
            return Ok(PumpEvent::Consumed);
        }

        self.scratch.set_position(0);
        let archive = self.scratch.get_u8()?;
        let file = self.scratch.get_u16()?;
        let compression = self.scratch.get_u8()?;
        let size = self.scratch.get_u32()? as usize;
        self.scratch.set_position(0);

        let key = FileKey::new(archive, file);
        let Some((priority, record)) = scheduler.lookup_in_flight(key) else {
            return Err(FatalError::UnknownResponseKey { archive, file });
        };

        // the reassembler's own prefix: compression method byte + size field,
        // plus the trailing uncompressed-size field when the body is compressed
        let prefix = if compression == 0 { 5 } else { 9 };
        let mut buffer = ByteCursor::fixed(record.padding as usize + prefix + size);
        buffer.put_u8(compression)?;
        buffer.put_u32(size as u32)?;

        self.response = Some(InProgress {
            key,
            priority,
            padding: record.padding,
            expected_crc: record.expected_crc,
            archive: record.archive.clone(),
            buffer,
        });
        self.block_offset = RESPONSE_HEADER_LENGTH;
        Ok(PumpEvent::Consumed)
    }

    fn read_marker(
        &mut self,
        transport: &mut dyn Transport,
        cipher: u8,
        response: InProgress,
    ) -> Result<PumpEvent, FatalError> {
        let window = self.scratch.window_mut(1)?;
        transport.read_into(window)?;
        decrypt(window, cipher);
        let marker = window[0];

        if marker == CONTINUATION_MARKER {
            // a fresh 512-byte window opens; the marker byte is its first slot
            self.block_offset = 1;
            self.response = Some(response);
        } else {
            // Desynced stream: abandon the response and let the byte we just
            // read stand as the first byte of a new header. Resynchronizing
            // beats wedging on one corrupt byte, but it is worth counting.
            self.desync_count += 1;
            warn!(
                "abandoning response for archive {}, file {}: continuation marker was {:#04x}",
                response.key.archive(),
                response.key.file(),
                marker
            );
            self.scratch.advance(1)?;
        }
        Ok(PumpEvent::Consumed)
    }

    fn read_body(
        &mut self,
        transport: &mut dyn Transport,
        available: usize,
        cipher: u8,
        mut response: InProgress,
    ) -> Result<PumpEvent, FatalError> {
        let body_len = response.body_len();
        let block_remaining = BLOCK_LENGTH - self.block_offset;
        let count = block_remaining
            .min(body_len - response.buffer.position())
            .min(available);

        let window = response.buffer.window_mut(count)?;
        transport.read_into(window)?;
        decrypt(window, cipher);
        response.buffer.advance(count)?;
        self.block_offset += count;

        if response.buffer.position() == body_len {
            self.block_offset = 0;
            return Ok(PumpEvent::Complete(response));
        }
        if self.block_offset == BLOCK_LENGTH {
            // block boundary; the next unit is a continuation marker
            self.block_offset = 0;
        }
        self.response = Some(response);
        Ok(PumpEvent::Consumed)
    }
}

fn decrypt(buf: &mut [u8], key: u8) {
    if key != 0 {
        for byte in buf.iter_mut() {
            *byte ^= key;
        }
    }
}
