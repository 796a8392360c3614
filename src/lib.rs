pub mod auth;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod net;
pub mod wire;

pub use config::Config;
pub use errors::ErrorResponse;
pub use gateway::Gateway;
