use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Clinic";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DB_PATH_ENV: &str = "CLINIC_DB_PATH";
pub const BIND_ADDR_ENV: &str = "CLINIC_BIND_ADDR";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Get the application data directory
/// ~/Clinic/ on all platforms, falling back to the working directory
/// when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Database file used when `CLINIC_DB_PATH` is not set.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("clinic.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clinic=info,clinic_lib=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {var}: {value} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl ClinicConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let database_path = get(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let raw_addr = get(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                var: BIND_ADDR_ENV,
                value: raw_addr.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            database_path,
            bind_addr,
        })
    }
}
