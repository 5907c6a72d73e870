use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::AppError;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Upstream credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<ApiKey>,
    pub upstream_url: Url,
    /// `None` means upstream calls may wait indefinitely.
    pub upstream_timeout: Option<Duration>,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source so tests never
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ELEVENLABS_API_KEY").and_then(ApiKey::new);

        let raw_url = lookup("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = Url::parse(&raw_url).map_err(|e| {
            AppError::Configuration(format!("UPSTREAM_BASE_URL '{}' is invalid: {}", raw_url, e))
        })?;

        let timeout_secs = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                AppError::Configuration(format!("UPSTREAM_TIMEOUT_SECS must be a number, got '{}'", v))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let upstream_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(v) => v.trim().parse::<u16>().map_err(|_| {
                AppError::Configuration(format!("PORT must be a number, got '{}'", v))
            })?,
            None => 3000,
        };
        let static_dir = lookup("STATIC_DIR")
            .unwrap_or_else(|| "./static".to_string())
            .into();

        Ok(Self {
            api_key,
            upstream_url,
            upstream_timeout,
            host,
            port,
            static_dir,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid bind address: {}", e)))
    }

    /// The credential, or the configuration error every proxy endpoint
    /// reports before contacting upstream.
    pub fn require_api_key(&self) -> Result<&ApiKey, AppError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| AppError::Configuration("ELEVENLABS_API_KEY is not set".into()))
    }
}
