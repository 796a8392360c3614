pub mod authentication_request;
pub mod message_type;

pub use authentication_request::AuthenticationRequest;
