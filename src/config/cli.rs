use clap::Parser;
use std::{net::IpAddr, path::PathBuf};

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_host: IpAddr,
    pub config_file_location: PathBuf,
    pub log_level: LogLevel,
}

impl CliConfig {
    /// Parse process arguments and environment. Invalid input exits with
    /// clap's usage message.
    pub fn from_args() -> Self {
        Self::from(Args::parse())
    }
}

impl From<Args> for CliConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_host: args.host,
            config_file_location: args.config_file,
            log_level: args.log_level,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "pgborg", version, about = "Postgres authentication proxy")]
pub struct Args {
    // IPv4 or IPv6 literal every proxy_port binds on.
    #[arg(long = "host", short = 'H', env = "PGBORG_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    #[arg(long = "config", env = "PGBORG_CONFIG_FILE", default_value = "pgborg.toml")]
    config_file: PathBuf,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
