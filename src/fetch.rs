//! Cache-aside fetching of catalog resources
//!
//! `CachedFetcher` decides per call whether to answer from the cache, go to
//! the network, or give up:
//!
//! 1. Offline: serve whatever the cache holds for the key, expired or not.
//! 2. Online with an unexpired entry: serve the cache without touching the network.
//! 3. Otherwise: fetch, decode, write the value back with the policy TTL.
//!
//! Failures never escape. A call ends with a value or with `FetchResult::Absent`.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::codec::{Codec, JsonCodec};
use crate::connectivity::ConnectivityOracle;
use crate::transport::{Transport, TransportError};

/// Time-to-live for entries written after a network fetch
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// A network request shared by every concurrent fetch of one key
type PendingFetch = Shared<BoxFuture<'static, Result<Arc<[u8]>, Arc<TransportError>>>>;

/// Identifies one cacheable query, used as both cache key and request path
///
/// Typically `<collection>?<query-params>`, e.g. `shows?limit=10&term=rust`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Where a fetched value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Cache entry served because the network was unavailable
    OfflineCache,
    /// Unexpired cache entry served without a network call
    FreshCache,
    /// Fetched from the network and written to the cache
    Network,
    /// Expired cache entry served after a failed network attempt
    StaleFallback,
}

/// Outcome of a fetch: a value or nothing
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
    Value { value: T, source: FetchSource },
    Absent,
}

impl<T> FetchResult<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            FetchResult::Value { value, .. } => Some(value),
            FetchResult::Absent => None,
        }
    }

    pub fn source(&self) -> Option<FetchSource> {
        match self {
            FetchResult::Value { source, .. } => Some(*source),
            FetchResult::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FetchResult::Absent)
    }
}

/// Tunables for `CachedFetcher`
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// TTL attached to every entry written after a network fetch
    pub ttl: Duration,
    /// Serve an expired cache entry when the network attempt fails
    pub serve_stale_on_failure: bool,
    /// Let concurrent fetches of one key share a single network request
    pub dedupe_in_flight: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            serve_stale_on_failure: false,
            dedupe_in_flight: true,
        }
    }
}

/// Answers resource requests from the cache or the network
pub struct CachedFetcher {
    store: Arc<dyn CacheStore>,
    connectivity: Arc<dyn ConnectivityOracle>,
    transport: Arc<dyn Transport>,
    policy: FetchPolicy,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
}

impl fmt::Debug for CachedFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("policy", &self.policy)
            .field("in_flight", &self.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

impl CachedFetcher {
    /// Creates a fetcher over explicitly constructed collaborators with the default policy
    pub fn new(
        store: Arc<dyn CacheStore>,
        connectivity: Arc<dyn ConnectivityOracle>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            store,
            connectivity,
            transport,
            policy: FetchPolicy::default(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the fetch policy
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches `key` as JSON
    pub async fn fetch_json<T>(&self, key: &ResourceKey) -> FetchResult<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        self.fetch(key, &JsonCodec::<T>::new()).await
    }

    /// Fetches `key`, decoding cached or network payloads with `codec`
    ///
    /// # Behavior
    /// - Offline: returns the cached value even if expired, or `Absent`
    /// - Online with an unexpired entry: returns the cached value
    /// - Otherwise fetches from the network and caches the decoded value
    /// - A failed or empty network fetch returns `Absent`, or the expired
    ///   entry when `serve_stale_on_failure` is set
    pub async fn fetch<T, C>(&self, key: &ResourceKey, codec: &C) -> FetchResult<T>
    where
        C: Codec<T> + ?Sized,
    {
        if !self.connectivity.has_network() {
            return match self.read_cached(key, codec) {
                Some(value) => {
                    tracing::debug!(%key, "offline, serving cached entry");
                    FetchResult::Value {
                        value,
                        source: FetchSource::OfflineCache,
                    }
                }
                None => {
                    tracing::debug!(%key, "offline and nothing cached");
                    FetchResult::Absent
                }
            };
        }

        if !self.store.is_expired(key.as_str()) {
            if let Some(value) = self.read_cached(key, codec) {
                tracing::debug!(%key, "serving fresh cache entry");
                return FetchResult::Value {
                    value,
                    source: FetchSource::FreshCache,
                };
            }
        }

        match self.network_payload(key).await {
            Ok(payload) => match codec.decode(&payload) {
                Ok(Some(value)) => {
                    self.write_back(key, codec, &value);
                    return FetchResult::Value {
                        value,
                        source: FetchSource::Network,
                    };
                }
                Ok(None) => tracing::debug!(%key, "network payload carried no value"),
                Err(e) => tracing::warn!(%key, error = %e, "network payload could not be decoded"),
            },
            Err(e) => tracing::warn!(%key, error = %e, "network fetch failed"),
        }

        if self.policy.serve_stale_on_failure {
            if let Some(value) = self.read_cached(key, codec) {
                tracing::debug!(%key, "serving stale cache entry after failed fetch");
                return FetchResult::Value {
                    value,
                    source: FetchSource::StaleFallback,
                };
            }
        }

        FetchResult::Absent
    }

    /// Reads and decodes the cached entry for `key`, absorbing faults
    fn read_cached<T, C>(&self, key: &ResourceKey, codec: &C) -> Option<T>
    where
        C: Codec<T> + ?Sized,
    {
        let data = match self.store.get(key.as_str()) {
            Ok(data) => data?,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache read failed");
                return None;
            }
        };

        match codec.decode(data.as_bytes()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cached entry could not be decoded");
                None
            }
        }
    }

    /// Caches a freshly fetched value; failures are logged and otherwise ignored
    fn write_back<T, C>(&self, key: &ResourceKey, codec: &C, value: &T)
    where
        C: Codec<T> + ?Sized,
    {
        let encoded = match codec.encode(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(%key, error = %e, "fetched value could not be encoded for caching");
                return;
            }
        };

        if let Err(e) = self.store.put(key.as_str(), &encoded, self.policy.ttl) {
            tracing::warn!(%key, error = %e, "cache write failed");
        }
    }

    /// Issues the network request for `key`, joining one already in flight
    async fn network_payload(&self, key: &ResourceKey) -> Result<Arc<[u8]>, Arc<TransportError>> {
        if !self.policy.dedupe_in_flight {
            return self
                .transport
                .get(key.as_str())
                .await
                .map(Arc::<[u8]>::from)
                .map_err(Arc::new);
        }

        let pending = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key.as_str()) {
                Some(pending) => {
                    tracing::debug!(%key, "joining in-flight request");
                    pending.clone()
                }
                None => {
                    let transport = Arc::clone(&self.transport);
                    let path = key.as_str().to_string();
                    let pending = async move {
                        transport
                            .get(&path)
                            .await
                            .map(Arc::<[u8]>::from)
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.as_str().to_string(), pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(key.as_str())
            .is_some_and(|current| current.ptr_eq(&pending))
        {
            in_flight.remove(key.as_str());
        }

        result
    }
}
