pub mod backends;
pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod types;

pub use backends::{BackendHostSetting, BackendsConfig, ConfigError, DEFAULT_CAPACITY};
pub use cli::CliConfig;
pub use config::Config;
pub use types::LogLevel;
