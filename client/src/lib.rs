//! # Depot Client
//! Provides a client that incrementally synchronizes versioned archive files
//! from a remote update peer over a single persistent connection. The engine
//! is driven by repeated non-blocking `poll` calls from one caller thread; it
//! schedules requests across two priority classes, reassembles the peer's
//! block-framed response stream, verifies file integrity, and hands completed
//! files to the local archive store.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod transport;

mod archive;
mod connection;
mod request;

pub use archive::{ArchiveHandle, ArchiveStore};
pub use connection::{
    config::SessionConfig,
    error::FatalError,
    opcode::{encode_file_request, encode_key_announcement, encode_login_state, Opcode},
    session::{SessionStatus, SyncSession},
};
pub use request::{record::RequestRecord, scheduler::RequestScheduler};
