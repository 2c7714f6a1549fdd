use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the external plants CRUD API, e.g. `http://host:3000/api`.
    pub plants_api_base_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Directory holding the durable key-value blobs (rules, alerts, queue).
    pub data_dir: String,
    /// Reading poll interval in seconds.
    pub poll_interval_secs: u64,
    /// TTL for the supervised-plant cache in seconds.
    pub cache_ttl_secs: u64,
    /// Per-request timeout for calls to the plants API, in seconds.
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            plants_api_base_url: required("PLANTS_API_BASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            data_dir: optional("DATA_DIR", "data"),
            poll_interval_secs: optional("POLL_INTERVAL_SECS", "60")
                .parse()
                .context("POLL_INTERVAL_SECS must be a positive integer")?,
            cache_ttl_secs: optional("CACHE_TTL_SECS", "300")
                .parse()
                .context("CACHE_TTL_SECS must be a positive integer")?,
            http_timeout_secs: optional("HTTP_TIMEOUT_SECS", "10")
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a positive integer")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
