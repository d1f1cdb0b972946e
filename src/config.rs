use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub datastore_url: String,
    pub datastore_key: String,
    pub news_file: PathBuf,
    pub static_dir: PathBuf,
    pub news_io_timeout: Duration,
    pub datastore_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `load` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let datastore_url = lookup("SUPABASE_URL")
            .ok_or_else(|| AppError::Config("SUPABASE_URL is not set".to_string()))?;
        let datastore_key = lookup("SUPABASE_KEY")
            .ok_or_else(|| AppError::Config("SUPABASE_KEY is not set".to_string()))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let news_file = lookup("NEWS_FILE").unwrap_or_else(|| "public/news.json".to_string());
        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "public".to_string());

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            datastore_url: datastore_url.trim_end_matches('/').to_string(),
            datastore_key,
            news_file: PathBuf::from(news_file),
            static_dir: PathBuf::from(static_dir),
            news_io_timeout: seconds(&lookup, "NEWS_IO_TIMEOUT_SECS", 5)?,
            datastore_timeout: seconds(&lookup, "DATASTORE_TIMEOUT_SECS", 10)?,
            request_timeout: seconds(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
    }
}
