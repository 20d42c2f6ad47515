//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default branch set, matching the reference deployment
const DEFAULT_BRANCHES: &str = "Coyoacán,Cuautitlán Izcalli";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory holding one CSV table per branch
    pub data_dir: PathBuf,
    /// Predefined branch names, in display order
    pub branches: Vec<String>,

    /// Allowed client origin for CORS
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let branches = parse_branches(
            &env::var("BRANCHES").unwrap_or_else(|_| DEFAULT_BRANCHES.to_string()),
        )?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./branches".to_string())
                .into(),

            branches,

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

/// Parse the comma-separated branch list. Branch names become file names,
/// so path separators are rejected here rather than at request time.
fn parse_branches(raw: &str) -> Result<Vec<String>, ConfigError> {
    let branches: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if branches.is_empty() {
        return Err(ConfigError::NoBranches);
    }

    for name in &branches {
        if name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidBranchName(name.clone()));
        }
    }

    Ok(branches)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("BRANCHES must name at least one branch")]
    NoBranches,

    #[error("Branch name contains a path separator: {0}")]
    InvalidBranchName(String),
}
