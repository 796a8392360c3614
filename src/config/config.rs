use std::net::IpAddr;

use super::{
    backends::{BackendsConfig, ConfigError},
    cli::CliConfig,
    types::LogLevel,
};

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_host: IpAddr,
    pub log_level: LogLevel,
    pub backends: BackendsConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// CLI/env first, then the backends file it points at.
    pub async fn load() -> Result<Config, ConfigError> {
        Self::from_cli(CliConfig::from_args()).await
    }

    pub async fn from_cli(cli: CliConfig) -> Result<Config, ConfigError> {
        let backends = BackendsConfig::from_file(&cli.config_file_location).await?;

        Ok(Config {
            listen_host: cli.listen_host,
            log_level: cli.log_level,
            backends,
        })
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
