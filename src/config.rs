use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::worker_pool::DEFAULT_POOL_SIZE;

pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_dir: PathBuf,
    pub worker_pool_size: usize,
    pub youtube_api_key: String,
    pub youtube_api_url: String,
    pub fetch_timeout: Duration,
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub cors_origin: String,
    pub shutdown_grace: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            bind_addr: parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            db_dir: PathBuf::from(
                std::env::var("DB_DIR").unwrap_or_else(|_| "dbase".to_string()),
            ),
            worker_pool_size: parse_var("WORKER_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            youtube_api_key: std::env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            youtube_api_url: std::env::var("YOUTUBE_API_URL")
                .unwrap_or_else(|_| DEFAULT_YOUTUBE_API_URL.to_string()),
            fetch_timeout: Duration::from_secs(parse_var("FETCH_TIMEOUT_SECS", 10)?),
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            token_ttl: Duration::from_secs(parse_var::<u64>("TOKEN_TTL_DAYS", 30)? * 24 * 60 * 60),
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            shutdown_grace: Duration::from_secs(parse_var("SHUTDOWN_GRACE_SECS", 5)?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.youtube_api_key.trim().is_empty() {
            return Err("YOUTUBE_API_KEY is not set".to_string());
        }
        if self.worker_pool_size == 0 {
            return Err("WORKER_POOL_SIZE must be at least 1".to_string());
        }
        if self.fetch_timeout.is_zero() {
            return Err("FETCH_TIMEOUT_SECS must be at least 1".to_string());
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            db_dir: PathBuf::from("dbase"),
            worker_pool_size: DEFAULT_POOL_SIZE,
            youtube_api_key: "key".to_string(),
            youtube_api_url: DEFAULT_YOUTUBE_API_URL.to_string(),
            fetch_timeout: Duration::from_secs(10),
            jwt_secret: None,
            token_ttl: Duration::from_secs(60),
            cors_origin: "http://localhost:4200".to_string(),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut missing_key = config();
        missing_key.youtube_api_key = " ".to_string();
        assert!(missing_key.validate().is_err());

        let mut empty_pool = config();
        empty_pool.worker_pool_size = 0;
        assert!(empty_pool.validate().is_err());

        let mut no_timeout = config();
        no_timeout.fetch_timeout = Duration::ZERO;
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u64 = parse_var("POPVID_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
