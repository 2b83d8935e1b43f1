//! Command-line interface parsing for podcatalog
//!
//! Parses arguments with clap and layers the flags over the environment
//! configuration.

use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{Config, ConnectivityMode};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The API URL is not an absolute http(s) URL
    #[error("Invalid API URL: '{0}'. Expected an absolute http or https URL")]
    InvalidApiUrl(String),
}

/// podcatalog - Browse the podcast catalog with an offline-capable cache
#[derive(Parser, Debug)]
#[command(name = "podcatalog")]
#[command(about = "Browse the podcast catalog through a local cache")]
#[command(version)]
pub struct Cli {
    /// Base URL of the catalog API (overrides PODCATALOG_API_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Directory for cached responses (overrides PODCATALOG_CACHE_DIR)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// How to decide whether the network is available
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    pub connectivity: Option<ConnectivityMode>,

    /// Serve expired cached data when the network request fails
    #[arg(long, global = true)]
    pub serve_stale: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Catalog queries
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List all categories
    Categories,
    /// List or search shows
    ///
    /// Examples:
    ///   podcatalog shows                          # First page of all shows
    ///   podcatalog shows --term rust              # Search by term
    ///   podcatalog shows --category <ID>          # Shows in a category
    Shows {
        /// Restrict to a category id
        #[arg(long, value_name = "ID")]
        category: Option<String>,
        /// Search term
        #[arg(long, value_name = "TERM")]
        term: Option<String>,
    },
    /// Show a single show by id
    Show {
        /// Show id
        id: String,
    },
}

impl Cli {
    /// Applies command-line overrides to `base`
    ///
    /// # Returns
    /// * `Ok(Config)` with flags taking precedence over `base`
    /// * `Err(CliError::InvalidApiUrl)` if the resulting API URL is unusable
    pub fn apply(&self, base: Config) -> Result<Config, CliError> {
        let mut config = base;
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(mode) = self.connectivity {
            config.connectivity = mode;
        }
        if self.serve_stale {
            config.serve_stale_on_failure = true;
        }

        validate_api_url(&config.api_url)?;
        Ok(config)
    }
}

/// Checks that `api_url` is an absolute http(s) URL
pub fn validate_api_url(api_url: &str) -> Result<(), CliError> {
    match Url::parse(api_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(CliError::InvalidApiUrl(api_url.to_string())),
    }
}
