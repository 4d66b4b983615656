use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use synop_reconcile::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub health_addr: SocketAddr,
    pub log_level: String,
    /// Restrict watches to one namespace; `None` watches all of them.
    pub watch_namespace: Option<String>,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let health_addr = lookup("SYNOP_HEALTH_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8081".to_string())
            .parse()
            .context("SYNOP_HEALTH_ADDR")?;

        let log_level = lookup("SYNOP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let watch_namespace = lookup("SYNOP_WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let secs = |name: &str, default: u64| -> Result<Duration> {
            match lookup(name) {
                Some(v) => Ok(Duration::from_secs(v.parse().context(name.to_string())?)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let max_retries = match lookup("SYNOP_MAX_RETRIES") {
            Some(v) => v.parse().context("SYNOP_MAX_RETRIES")?,
            None => 10,
        };

        let retry = RetryPolicy {
            base: secs("SYNOP_RETRY_BASE_SECS", 5)?,
            max: secs("SYNOP_RETRY_MAX_SECS", 300)?,
            max_retries,
            window: secs("SYNOP_RETRY_WINDOW_SECS", 600)?,
        };

        Ok(Self {
            health_addr,
            log_level,
            watch_namespace,
            retry,
        })
    }
}
