use thiserror::Error;

/// Errors reported by a transport implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The stream is closed or was never opened
    #[error("transport is closed")]
    Closed,

    /// The stream reported an unreadable state
    #[error("transport is unreadable")]
    Unreadable,

    /// A send could not be completed
    #[error("failed to send {len} bytes")]
    SendFailed { len: usize },

    /// A read could not be completed
    #[error("failed to read {len} bytes")]
    ReadFailed { len: usize },
}
