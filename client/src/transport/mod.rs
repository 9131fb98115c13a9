mod error;

pub use error::TransportError;

/// The raw byte stream to the update peer. Implementations live outside this
/// crate (a TCP socket, an in-memory pair for tests); the engine only ever
/// polls — no method may block waiting for I/O.
pub trait Transport {
    /// Send a complete outbound message.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Number of inbound bytes that can be read without blocking.
    /// An unreadable or closed stream is an error, not zero.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read exactly `buf.len()` bytes into `buf`. Callers never request more
    /// than `bytes_available` reported.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Tear the stream down. Must not fail; teardown of an already-broken
    /// transport is a no-op.
    fn close(&mut self);
}
