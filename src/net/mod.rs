// net/mod.rs
//! Networking layer: a thin byte-stream wrapper with frame-aware reads.
//! Nothing in here knows about authentication.

pub mod connection;

pub use connection::{ConnectError, Connection, RECEIVE_BUFFER_SIZE};
