use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use pgborg::{Config, Gateway};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🐘 pgborg";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = setup().await;
    run_until_ctrl_c(config).await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() -> Config {
    // Nothing can be proxied without a valid backends file.
    let config = Config::load()
        .await
        .unwrap_or_else(|e| panic!("invalid configuration: {e}"));

    init_tracing(&config);
    config
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(config.log_level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_until_ctrl_c(config: Config) -> std::io::Result<()> {
    let gateway = Gateway::bind(config.listen_host, &config.backends).await?;

    info!(
        "{} serving {} backend(s) on {}",
        APP_NAME,
        config.backends.len(),
        config.listen_host
    );

    gateway
        .serve(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("ctrl-c handler failed: {e}");
            }
        })
        .await;

    info!("{} stopped", APP_NAME);
    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
