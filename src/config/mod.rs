//! Configuration module for the link-in-bio backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key required for write requests (optional)
    pub api_psk: Option<String>,
    /// Path to the SQLite file backing the item store
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Upper bound on items returned by one list call
    pub list_limit: usize,
    /// How many times a busy transaction is retried
    pub txn_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("LINKBIO_API_PSK")
            .ok()
            .filter(|key| !key.is_empty());

        let db_path = env::var("LINKBIO_DB_PATH")
            .unwrap_or_else(|_| "./data/linkbio.sqlite".to_string())
            .into();

        let bind_addr = env::var("LINKBIO_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid LINKBIO_BIND_ADDR format");

        let log_level = env::var("LINKBIO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        // A zero bound would hide every profile
        let list_limit = env::var("LINKBIO_LIST_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(100)
            .max(1);

        let txn_retries = env::var("LINKBIO_TXN_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            list_limit,
            txn_retries,
        }
    }
}
