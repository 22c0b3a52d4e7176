//! Configuration module for the freight site backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Deployment flavour; decides what a failed article fetch degrades to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
        }
    }
}

impl std::str::FromStr for AppEnv {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(AppError::Config(format!("Unknown FREIGHT_ENV value: {}", other))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database backing the hosted service.
    /// `None` leaves the backend unconfigured (local fallback mode).
    pub db_path: Option<PathBuf>,
    /// Deployment environment
    pub app_env: AppEnv,
    /// Static-snapshot generation mode; no network reads are issued
    pub prerender: bool,
    /// Snapshot consumed in prerender mode
    pub snapshot_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Admin account created at startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Lifetime of an admin session in seconds
    pub session_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("FREIGHT_DB_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let app_env = match env::var("FREIGHT_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => AppEnv::Development,
        };

        let prerender = parse_flag("FREIGHT_PRERENDER")?;

        let snapshot_path = env::var("FREIGHT_SNAPSHOT_PATH")
            .unwrap_or_else(|_| "./data/prerender-snapshot.json".to_string())
            .into();

        let bind_addr = env::var("FREIGHT_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid FREIGHT_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("FREIGHT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = parse_flag("FREIGHT_LOG_JSON")?;

        let admin_email = env::var("FREIGHT_ADMIN_EMAIL").ok();
        let admin_password = env::var("FREIGHT_ADMIN_PASSWORD").ok();

        let session_ttl_secs = match env::var("FREIGHT_SESSION_TTL_SECS") {
            Ok(value) => value.trim().parse().map_err(|e| {
                AppError::Config(format!("Invalid FREIGHT_SESSION_TTL_SECS: {}", e))
            })?,
            Err(_) => 3600,
        };

        Ok(Self {
            db_path,
            app_env,
            prerender,
            snapshot_path,
            bind_addr,
            log_level,
            log_json,
            admin_email,
            admin_password,
            session_ttl_secs,
        })
    }
}

fn parse_flag(name: &str) -> Result<bool, AppError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(AppError::Config(format!("Invalid {} value: {}", name, other))),
        },
        Err(_) => Ok(false),
    }
}
