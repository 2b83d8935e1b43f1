//! Application wiring
//!
//! Assembles the cache store, connectivity oracle and transport described by
//! a `Config` into a `CatalogService`, and runs CLI commands against it.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::FileCacheStore;
use crate::catalog::CatalogService;
use crate::cli::Command;
use crate::config::{Config, ConnectivityMode};
use crate::connectivity::{
    AlwaysOnline, ConnectivityOracle, MonitorConfig, NetworkMonitor, StaticConnectivity,
};
use crate::fetch::{CachedFetcher, FetchPolicy, FetchResult};
use crate::transport::{HttpTransport, TransportError};

/// Errors that can occur while assembling the application
#[derive(Debug, Error)]
pub enum AppError {
    /// No cache directory configured and none could be determined
    #[error("Could not determine a cache directory; set PODCATALOG_CACHE_DIR or --cache-dir")]
    NoCacheDir,

    /// HTTP client could not be built
    #[error("Failed to create HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// A configured catalog client
pub struct App {
    pub catalog: CatalogService,
    /// Whether a background reachability check feeds the fetcher
    probing: bool,
    cache_dir: PathBuf,
}

impl App {
    /// Builds the application from configuration
    ///
    /// Must be called from within a tokio runtime when `connectivity` is `Probe`.
    pub async fn build(config: &Config) -> Result<Self, AppError> {
        let store = match &config.cache_dir {
            Some(dir) => FileCacheStore::with_dir(dir.clone()),
            None => FileCacheStore::new().ok_or(AppError::NoCacheDir)?,
        };
        let cache_dir = store.cache_dir().to_path_buf();

        let mut probing = false;
        let connectivity: Arc<dyn ConnectivityOracle> = match config.connectivity {
            ConnectivityMode::Online => Arc::new(AlwaysOnline),
            ConnectivityMode::Offline => Arc::new(StaticConnectivity(false)),
            ConnectivityMode::Probe => match config.probe_target() {
                Some(probe_addr) => {
                    // The background check stops once the fetcher drops its monitor
                    let monitor = NetworkMonitor::spawn(MonitorConfig {
                        probe_addr,
                        ..MonitorConfig::default()
                    })
                    .await;
                    probing = true;
                    Arc::new(monitor) as Arc<dyn ConnectivityOracle>
                }
                None => {
                    tracing::warn!(api_url = %config.api_url, "no probe address, assuming online");
                    Arc::new(AlwaysOnline)
                }
            },
        };

        let transport = HttpTransport::new(config.api_url.clone(), config.request_timeout)?;
        let policy = FetchPolicy {
            serve_stale_on_failure: config.serve_stale_on_failure,
            ..FetchPolicy::default()
        };
        let fetcher = CachedFetcher::new(Arc::new(store), connectivity, Arc::new(transport))
            .with_policy(policy);

        tracing::debug!(cache_dir = %cache_dir.display(), api_url = %config.api_url, "catalog client ready");

        Ok(Self {
            catalog: CatalogService::new(Arc::new(fetcher)),
            probing,
            cache_dir,
        })
    }

    /// Directory holding cached responses
    pub fn cache_dir(&self) -> &std::path::Path {
        &self.cache_dir
    }

    /// Whether a background reachability check is running
    pub fn is_probing(&self) -> bool {
        self.probing
    }

    /// Runs a command and returns its result as JSON, or `None` if nothing was obtainable
    pub async fn run(&self, command: &Command) -> Option<Value> {
        match command {
            Command::Categories => to_json(self.catalog.categories().await),
            Command::Show { id } => to_json(self.catalog.show(id).await),
            Command::Shows { category, term } => match (category.as_deref(), term.as_deref()) {
                (Some(category), Some(term)) => {
                    to_json(self.catalog.search_in_category(category, term).await)
                }
                (Some(category), None) => {
                    serde_json::to_value(self.catalog.shows_by_category(category).await).ok()
                }
                (None, Some(term)) => to_json(self.catalog.search(term).await),
                (None, None) => to_json(self.catalog.shows().await),
            },
        }
    }
}

fn to_json<T: Serialize>(result: FetchResult<T>) -> Option<Value> {
    let value = result.into_value()?;
    match serde_json::to_value(value) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(error = %e, "result could not be rendered as JSON");
            None
        }
    }
}
