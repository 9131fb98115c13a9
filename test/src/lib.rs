//! Test harness for the depot workspace: an in-memory transport, a recording
//! archive store, and a builder for the peer's wire responses.
