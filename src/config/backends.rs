use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::fs;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_CAPACITY: u32 = 5;

// -----------------------------------------------------------------------------
// ----- BackendsConfig --------------------------------------------------------

/// Backend definitions, immutable once loaded.
#[derive(Debug, Clone)]
pub struct BackendsConfig {
    by_name: BTreeMap<String, Arc<BackendHostSetting>>,
}

// -----------------------------------------------------------------------------
// ----- BackendsConfig: Static ------------------------------------------------

impl BackendsConfig {
    pub async fn from_file(path: &Path) -> Result<BackendsConfig, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<BackendsConfig, ConfigError> {
        let mut doc: BackendsFile =
            toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;

        if doc.backends.is_empty() {
            return Err(ConfigError::EmptyConfig);
        }

        let mut by_name = BTreeMap::new();
        let mut proxy_ports = HashSet::with_capacity(doc.backends.len());

        for entry in doc.backends.drain(..) {
            validate(&entry)?;

            if entry.proxy_port != 0 && !proxy_ports.insert(entry.proxy_port) {
                return Err(ConfigError::DuplicateProxyPort {
                    port: entry.proxy_port,
                });
            }

            let database = entry
                .database
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| entry.username.clone());

            let record = BackendHostSetting {
                name: entry.name.clone(),
                host: entry.host,
                port: entry.port,
                username: entry.username,
                password: SecretString::new(entry.password.into_boxed_str()),
                database,
                proxy_port: entry.proxy_port,
                capacity: entry.capacity,
                options: entry.options,
            };

            if by_name.insert(entry.name.clone(), Arc::new(record)).is_some() {
                return Err(ConfigError::DuplicateBackend { name: entry.name });
            }
        }

        Ok(BackendsConfig { by_name })
    }
}

// -----------------------------------------------------------------------------
// ----- BackendsConfig: Public ------------------------------------------------

impl BackendsConfig {
    pub fn get(&self, name: &str) -> Option<Arc<BackendHostSetting>> {
        self.by_name.get(name).cloned()
    }

    /// Backends in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendHostSetting>> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- BackendHostSetting ----------------------------------------------------

#[derive(Debug, Clone)]
pub struct BackendHostSetting {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub database: String,

    pub proxy_port: u16,
    /// Concurrent backend sessions allowed; enforced by the gateway.
    pub capacity: u32,
    /// Extra startup parameters, sent in key order.
    pub options: BTreeMap<String, String>,
}

impl BackendHostSetting {
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn password_exposed(&self) -> &str {
        self.password.expose_secret()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct BackendsFile {
    #[serde(default)]
    backends: Vec<BackendFileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct BackendFileEntry {
    name: String,
    host: String,
    port: u16,

    #[serde(alias = "user")]
    username: String,

    #[serde(default)]
    password: String,

    #[serde(default)]
    database: Option<String>,

    proxy_port: u16,

    #[serde(default = "default_capacity")]
    capacity: u32,

    #[serde(default)]
    options: BTreeMap<String, String>,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

fn validate(entry: &BackendFileEntry) -> Result<(), ConfigError> {
    if entry.name.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            backend: entry.name.clone(),
            field: "name",
        });
    }
    if entry.host.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            backend: entry.name.clone(),
            field: "host",
        });
    }
    if entry.username.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            backend: entry.name.clone(),
            field: "username",
        });
    }
    if entry.capacity == 0 {
        return Err(ConfigError::InvalidField {
            backend: entry.name.clone(),
            field: "capacity",
        });
    }
    if let Some(key) = ["user", "database"]
        .into_iter()
        .find(|k| entry.options.contains_key(*k))
    {
        return Err(ConfigError::ReservedOption {
            backend: entry.name.clone(),
            option: key.to_string(),
        });
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no [[backends]] configured")]
    EmptyConfig,

    #[error("duplicate [[backends]] entry for backend '{name}'")]
    DuplicateBackend { name: String },

    #[error("proxy_port {port} is used by more than one backend")]
    DuplicateProxyPort { port: u16 },

    #[error("backend '{backend}': invalid or missing field '{field}'")]
    InvalidField {
        backend: String,
        field: &'static str,
    },

    #[error("backend '{backend}': option '{option}' is set from the backend definition")]
    ReservedOption { backend: String, option: String },

    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
