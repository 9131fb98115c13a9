// Opcodes for the outbound half of the protocol. Every outbound message is
// exactly 4 bytes; the inbound stream carries no opcodes at all.

use depot_shared::{FileKey, Priority, REQUEST_MESSAGE_LENGTH};

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum Opcode {
    // A file request that may be queued behind others by the peer
    Request = 0,
    // A file request the peer should answer ahead of queued ones
    PriorityRequest = 1,
    // The session is authenticated
    LoggedIn = 2,
    // The session is not authenticated
    LoggedOut = 3,
    // Announces the single-byte XOR key for all subsequent traffic
    NewEncryption = 4,
}

/// Request message: opcode followed by the 24-bit file key.
pub fn encode_file_request(priority: Priority, key: FileKey) -> [u8; REQUEST_MESSAGE_LENGTH] {
    let opcode = if priority.is_high() {
        Opcode::PriorityRequest
    } else {
        Opcode::Request
    };
    let raw = key.as_u24();
    [opcode as u8, (raw >> 16) as u8, (raw >> 8) as u8, raw as u8]
}

/// Login-state notification: opcode and three zero bytes.
pub fn encode_login_state(authenticated: bool) -> [u8; REQUEST_MESSAGE_LENGTH] {
    let opcode = if authenticated {
        Opcode::LoggedIn
    } else {
        Opcode::LoggedOut
    };
    [opcode as u8, 0, 0, 0]
}

/// Key announcement: opcode, the key byte, two zero bytes.
pub fn encode_key_announcement(key_byte: u8) -> [u8; REQUEST_MESSAGE_LENGTH] {
    [Opcode::NewEncryption as u8, key_byte, 0, 0]
}
