//! Runtime configuration
//!
//! Values come from defaults, then `PODCATALOG_*` environment variables, then
//! command-line flags (applied in `cli`).

use clap::ValueEnum;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// How network reachability is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectivityMode {
    /// Probe the API host in the background
    Probe,
    /// Always assume the network is up
    Online,
    /// Never use the network; serve only from cache
    Offline,
}

/// Settings for building the catalog client
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the catalog API
    pub api_url: String,
    /// Cache directory; the XDG cache dir when unset
    pub cache_dir: Option<PathBuf>,
    /// Per-request network timeout
    pub request_timeout: Duration,
    /// Reachability strategy
    pub connectivity: ConnectivityMode,
    /// `host:port` probed for reachability; derived from `api_url` when unset
    pub probe_addr: Option<String>,
    /// Serve expired cache entries when a network fetch fails
    pub serve_stale_on_failure: bool,
}

impl Config {
    const DEFAULT_API_URL: &'static str = "http://localhost:5000/v1/";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Reads configuration from `PODCATALOG_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let request_timeout = match lookup("PODCATALOG_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "PODCATALOG_TIMEOUT_SECS is not a positive integer, using default");
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        let serve_stale_on_failure = match lookup("PODCATALOG_SERVE_STALE") {
            Some(raw) => match parse_flag(&raw) {
                Some(flag) => flag,
                None => {
                    warn!(value = %raw, "PODCATALOG_SERVE_STALE is not a boolean, using default");
                    defaults.serve_stale_on_failure
                }
            },
            None => defaults.serve_stale_on_failure,
        };

        Self {
            api_url: lookup("PODCATALOG_API_URL").unwrap_or(defaults.api_url),
            cache_dir: lookup("PODCATALOG_CACHE_DIR").map(PathBuf::from),
            request_timeout,
            connectivity: defaults.connectivity,
            probe_addr: lookup("PODCATALOG_PROBE_ADDR"),
            serve_stale_on_failure,
        }
    }

    /// Address to probe for reachability
    ///
    /// Uses `probe_addr` if set, otherwise the host and port of `api_url`.
    pub fn probe_target(&self) -> Option<String> {
        if let Some(addr) = &self.probe_addr {
            return Some(addr.clone());
        }
        let url = Url::parse(&self.api_url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            cache_dir: None,
            request_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            connectivity: ConnectivityMode::Probe,
            probe_addr: None,
            serve_stale_on_failure: false,
        }
    }
}

/// Parses common boolean spellings
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
