use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::tracker::RetentionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Accepted `x-api-key` values. Empty disables the check.
    pub api_keys: Vec<String>,
    pub retention: RetentionPolicy,
    pub sweep_interval: Duration,
    /// Tick of the metrics SSE stream.
    pub stream_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            api_keys: Vec::new(),
            retention: RetentionPolicy::default(),
            sweep_interval: Duration::from_secs(60),
            stream_interval: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key → value source; unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = parse_or("LISTEN_ADDR", &lookup, defaults.listen_addr)?;

        let api_keys = lookup("API_SECRET_KEY")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let max_requests = positive(
            "TRACKER_MAX_REQUESTS",
            &lookup,
            defaults.retention.max_requests as u64,
        )?;
        let max_age_secs = positive(
            "TRACKER_MAX_AGE_SECS",
            &lookup,
            defaults.retention.max_age.as_secs(),
        )?;
        let sweep_secs = positive(
            "TRACKER_SWEEP_INTERVAL_SECS",
            &lookup,
            defaults.sweep_interval.as_secs(),
        )?;
        let stream_ms = positive(
            "METRICS_STREAM_INTERVAL_MS",
            &lookup,
            defaults.stream_interval.as_millis() as u64,
        )?;

        Ok(Self {
            listen_addr,
            api_keys,
            retention: RetentionPolicy {
                max_requests: max_requests as usize,
                max_age: Duration::from_secs(max_age_secs),
            },
            sweep_interval: Duration::from_secs(sweep_secs),
            stream_interval: Duration::from_millis(stream_ms),
        })
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn positive<F>(key: &'static str, lookup: &F, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(key, lookup, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
