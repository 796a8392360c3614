// wire/mod.rs
//! PostgreSQL v3 wire format: message tags, authentication requests, and the
//! codec used by the authentication pathways.

pub mod codec;
pub mod types;
pub mod utils;

pub use codec::{
    build_password_message, build_startup_message, build_terminate_message,
    is_authentication_ok, message_length, message_type, protocol_version,
};
pub use types::AuthenticationRequest;
