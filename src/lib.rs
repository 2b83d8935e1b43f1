//! podcatalog library
//!
//! Read access to a remote podcast catalog through a disk-backed cache that
//! keeps working when the network is slow, flaky or gone. `fetch` holds the
//! cache-or-network policy; `cache`, `connectivity` and `transport` are the
//! collaborators it is built from.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod codec;
pub mod config;
pub mod connectivity;
pub mod fetch;
pub mod transport;

pub use cache::{CacheError, CacheStore, FileCacheStore};
pub use catalog::{CatalogService, Category, Show};
pub use codec::{Codec, DecodeError, JsonCodec};
pub use connectivity::{AlwaysOnline, ConnectivityOracle, NetworkMonitor, StaticConnectivity};
pub use fetch::{CachedFetcher, FetchPolicy, FetchResult, FetchSource, ResourceKey, DEFAULT_TTL};
pub use transport::{HttpTransport, Transport, TransportError};
