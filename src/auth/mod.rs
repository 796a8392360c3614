// auth/mod.rs
//! The two authentication pathways: the proxy authenticating itself to a
//! backend, and validating an end client by relaying its handshake.

pub mod backend;
pub mod client;
pub mod md5;

pub use backend::authenticate;
pub use client::{AuthenticationOutcome, ClientAuthError, RelayState, authenticate_client};
pub use md5::md5_password;
