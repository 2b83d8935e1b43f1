//! Network reachability checks
//!
//! A `ConnectivityOracle` answers "is the network believed to be up right
//! now?" without blocking. Each deployment picks the implementation that
//! fits it instead of the fetch logic special-casing platforms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Point-in-time view of network reachability
pub trait ConnectivityOracle: Send + Sync {
    /// Returns true if outbound network access is currently believed available
    fn has_network(&self) -> bool;
}

/// Oracle for targets that always treat themselves as online
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityOracle for AlwaysOnline {
    fn has_network(&self) -> bool {
        true
    }
}

/// Oracle with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub bool);

impl ConnectivityOracle for StaticConnectivity {
    fn has_network(&self) -> bool {
        self.0
    }
}

/// Configuration for the background reachability probe
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// `host:port` to open a TCP connection to
    pub probe_addr: String,
    /// Time between probes
    pub interval: Duration,
    /// How long a single connection attempt may take
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:53".to_string(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Oracle fed by a background task that periodically probes a TCP endpoint
///
/// `has_network` only reads the last probe result, so it never waits on I/O.
/// The probe task stops when `shutdown` is called or the monitor is dropped.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
}

impl NetworkMonitor {
    /// Runs one probe, then spawns the periodic probe task
    ///
    /// Must be called from within a tokio runtime.
    pub async fn spawn(config: MonitorConfig) -> Self {
        let online = Arc::new(AtomicBool::new(probe(&config).await));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let flag = online.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            // Skip the first tick (immediate), the initial probe already ran
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let reachable = probe(&config).await;
                        if flag.swap(reachable, Ordering::Relaxed) != reachable {
                            tracing::info!(reachable, addr = %config.probe_addr, "network reachability changed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            online,
            shutdown_tx,
        }
    }

    /// Stops the probe task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl ConnectivityOracle for NetworkMonitor {
    fn has_network(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

/// Attempts one TCP connection to the probe address
async fn probe(config: &MonitorConfig) -> bool {
    match tokio::time::timeout(config.timeout, TcpStream::connect(&config.probe_addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(addr = %config.probe_addr, error = %e, "network probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(addr = %config.probe_addr, "network probe timed out");
            false
        }
    }
}
