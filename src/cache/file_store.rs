//! File-backed cache store
//!
//! Stores each entry as a JSON file holding the serialized value together
//! with its write and expiry timestamps.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, CacheStore};
use crate::clock::{Clock, SystemClock};

/// Sequence for temp file names so concurrent writers never share one
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Longest escaped key used verbatim as a file name stem
const MAX_PLAIN_STEM: usize = 96;

/// Escaped bytes of the key kept in front of the digest for long keys
const HASHED_STEM_PREFIX: usize = 40;

/// On-disk representation of a cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// The key this entry was written under
    key: String,
    /// The serialized value
    data: String,
    /// When the entry was written
    cached_at: DateTime<Utc>,
    /// When the entry stops being fresh
    expires_at: DateTime<Utc>,
}

/// Cache store that persists entries as JSON files
///
/// Entries live in an XDG-compliant cache directory (`~/.cache/podcatalog/`
/// on Linux) unless a directory is given explicitly, and survive process
/// restarts.
#[derive(Clone)]
pub struct FileCacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// Time source for stamping and expiry checks
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FileCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCacheStore")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl FileCacheStore {
    /// Creates a store in the XDG cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "podcatalog")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Directory holding the cache files
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    /// Reads and parses the entry for `key`, if one exists
    ///
    /// A file holding another key's entry counts as no entry.
    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let content = match fs::read_to_string(self.cache_path(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&content)?;
        if entry.key != key {
            tracing::debug!(key, stored = %entry.key, "cache file belongs to another key");
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

impl CacheStore for FileCacheStore {
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_delta = ChronoDuration::from_std(ttl).map_err(|_| CacheError::InvalidTtl(ttl))?;
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl_delta)
            .ok_or(CacheError::InvalidTtl(ttl))?;

        let entry = CacheEntry {
            key: key.to_string(),
            data: value.to_string(),
            cached_at: now,
            expires_at,
        };
        let json = serde_json::to_string_pretty(&entry)?;

        fs::create_dir_all(&self.cache_dir)?;

        // Write beside the target and rename over it so readers never see a partial entry
        let temp_path = self.cache_dir.join(format!(
            ".{}.{}.{}.tmp",
            file_stem(key),
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, self.cache_path(key)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::trace!(key, %expires_at, "cache entry written");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read_entry(key)?.map(|entry| entry.data))
    }

    fn is_expired(&self, key: &str) -> bool {
        match self.read_entry(key) {
            Ok(Some(entry)) => self.clock.now() > entry.expires_at,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable cache entry treated as expired");
                true
            }
        }
    }
}

/// Maps a key to a file name stem
///
/// Every byte outside `[A-Za-z0-9_-]` becomes `%XX`, so no key can escape the
/// cache directory. Escaped keys longer than `MAX_PLAIN_STEM` are cut to a
/// readable prefix followed by `~` and the SHA-256 of the key, which keeps
/// file names bounded. `~` is always escaped, so the two forms never meet.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            let _ = write!(stem, "%{:02X}", byte);
        }
    }

    if stem.len() > MAX_PLAIN_STEM {
        // The escaped stem is ASCII, so any byte index is a char boundary
        stem.truncate(HASHED_STEM_PREFIX);
        stem.push('~');
        stem.push_str(&hex::encode(Sha256::digest(key.as_bytes())));
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(600);

    fn create_test_store() -> (FileCacheStore, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::default());
        let store = FileCacheStore::with_dir(temp_dir.path().to_path_buf()).with_clock(clock.clone());
        (store, clock, temp_dir)
    }

    #[test]
    fn test_unwritten_key_is_absent_and_expired() {
        let (store, _clock, _temp_dir) = create_test_store();

        assert!(store.get("categories").expect("Read should succeed").is_none());
        assert!(store.is_expired("categories"));
    }

    #[test]
    fn test_put_then_get_is_fresh() {
        let (store, _clock, _temp_dir) = create_test_store();

        store.put("categories", r#"[{"id":"1"}]"#, TTL).expect("Write should succeed");

        assert_eq!(
            store.get("categories").expect("Read should succeed").as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
        assert!(!store.is_expired("categories"));
    }

    #[test]
    fn test_entry_expires_after_ttl_and_stays_readable() {
        let (store, clock, _temp_dir) = create_test_store();
        store.put("categories", "[]", TTL).expect("Write should succeed");

        clock.advance(ChronoDuration::minutes(10));
        assert!(!store.is_expired("categories"), "Exactly one TTL old is not yet expired");

        clock.advance(ChronoDuration::seconds(1));
        assert!(store.is_expired("categories"));
        assert_eq!(
            store.get("categories").expect("Read should succeed").as_deref(),
            Some("[]"),
            "Expired entries are still returned"
        );

        clock.advance(ChronoDuration::hours(5));
        assert!(store.is_expired("categories"));
    }

    #[test]
    fn test_put_refreshes_expired_entry() {
        let (store, clock, _temp_dir) = create_test_store();
        store.put("shows/42", "\"old\"", TTL).expect("Write should succeed");
        clock.advance(ChronoDuration::minutes(15));
        assert!(store.is_expired("shows/42"));

        store.put("shows/42", "\"new\"", TTL).expect("Write should succeed");

        assert!(!store.is_expired("shows/42"));
        assert_eq!(
            store.get("shows/42").expect("Read should succeed").as_deref(),
            Some("\"new\"")
        );
    }

    #[test]
    fn test_query_keys_map_to_distinct_files_inside_cache_dir() {
        let (store, _clock, temp_dir) = create_test_store();

        store
            .put("shows?limit=10&term=rust", "\"a\"", TTL)
            .expect("Write should succeed");
        store
            .put("shows?limit=10&term=rust/", "\"b\"", TTL)
            .expect("Write should succeed");
        store.put("../escape", "\"c\"", TTL).expect("Write should succeed");

        assert_eq!(
            store.get("shows?limit=10&term=rust").unwrap().as_deref(),
            Some("\"a\"")
        );
        assert_eq!(
            store.get("shows?limit=10&term=rust/").unwrap().as_deref(),
            Some("\"b\"")
        );
        assert_eq!(store.get("../escape").unwrap().as_deref(), Some("\"c\""));

        let files = fs::read_dir(temp_dir.path()).expect("Should list cache dir").count();
        assert_eq!(files, 3, "No temp files should be left behind");
        assert!(!temp_dir.path().parent().unwrap().join("escape.json").exists());
    }

    #[test]
    fn test_file_stem_escapes_reserved_bytes() {
        assert_eq!(file_stem("categories"), "categories");
        assert_eq!(file_stem("shows/7"), "shows%2F7");
        assert_eq!(
            file_stem("shows?limit=10&term=a b"),
            "shows%3Flimit%3D10%26term%3Da%20b"
        );
        assert_eq!(file_stem(".."), "%2E%2E");
    }

    #[test]
    fn test_long_key_round_trips_with_bounded_file_name() {
        let (store, _clock, temp_dir) = create_test_store();
        let key = format!("shows?limit=10&term={}", "a".repeat(280));
        assert!(key.len() >= 300);

        store.put(&key, "[1]", TTL).expect("Write should succeed");

        assert_eq!(store.get(&key).expect("Read should succeed").as_deref(), Some("[1]"));
        assert!(!store.is_expired(&key));

        let name = fs::read_dir(temp_dir.path())
            .unwrap()
            .next()
            .expect("One cache file expected")
            .unwrap()
            .file_name();
        assert!(name.len() <= HASHED_STEM_PREFIX + 1 + 64 + ".json".len());
    }

    #[test]
    fn test_long_keys_sharing_a_prefix_stay_separate() {
        let (store, _clock, _temp_dir) = create_test_store();
        let prefix = "x".repeat(200);
        let first = format!("{}1", prefix);
        let second = format!("{}2", prefix);

        store.put(&first, "\"first\"", TTL).unwrap();
        store.put(&second, "\"second\"", TTL).unwrap();

        assert_eq!(store.get(&first).unwrap().as_deref(), Some("\"first\""));
        assert_eq!(store.get(&second).unwrap().as_deref(), Some("\"second\""));
    }

    #[test]
    fn test_file_stem_hashes_long_keys() {
        let key = "é".repeat(50);
        let stem = file_stem(&key);

        assert_eq!(stem.len(), HASHED_STEM_PREFIX + 1 + 64);
        assert!(stem.starts_with("%C3%A9"));
        assert_eq!(stem, file_stem(&key), "Stem must be stable");
        assert!(!file_stem("short~key").contains('~'));
    }

    #[test]
    fn test_entry_for_another_key_is_absent() {
        let (store, _clock, temp_dir) = create_test_store();
        store
            .put("shows?limit=10&term=rust", "\"other\"", TTL)
            .expect("Write should succeed");
        // Put that entry where the upper-case key's file lives, as a case-folding filesystem would
        fs::rename(
            temp_dir.path().join(format!("{}.json", file_stem("shows?limit=10&term=rust"))),
            temp_dir.path().join(format!("{}.json", file_stem("shows?limit=10&term=Rust"))),
        )
        .unwrap();

        assert!(store.get("shows?limit=10&term=Rust").unwrap().is_none());
        assert!(store.is_expired("shows?limit=10&term=Rust"));
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache");
        let store = FileCacheStore::with_dir(nested_path.clone());

        store.put("categories", "[]", TTL).expect("Write should succeed");

        assert!(nested_path.join("categories.json").exists());
    }

    #[test]
    fn test_entries_survive_a_new_store_instance() {
        let (store, _clock, temp_dir) = create_test_store();
        store.put("categories", "[1,2]", TTL).expect("Write should succeed");
        drop(store);

        let reopened = FileCacheStore::with_dir(temp_dir.path().to_path_buf());

        assert_eq!(reopened.get("categories").unwrap().as_deref(), Some("[1,2]"));
        assert!(!reopened.is_expired("categories"));
    }

    #[test]
    fn test_corrupt_entry_is_an_error_and_expired() {
        let (store, _clock, temp_dir) = create_test_store();
        fs::write(temp_dir.path().join("categories.json"), "not json").unwrap();

        assert!(matches!(store.get("categories"), Err(CacheError::Serialize(_))));
        assert!(store.is_expired("categories"));
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected() {
        let (store, _clock, _temp_dir) = create_test_store();

        let result = store.put("categories", "[]", Duration::from_secs(u64::MAX));

        assert!(matches!(result, Err(CacheError::InvalidTtl(_))));
        assert!(store.get("categories").unwrap().is_none());
    }

    #[test]
    fn test_entry_file_records_timestamps() {
        let (store, clock, temp_dir) = create_test_store();
        let written_at = clock.now();

        store.put("categories", "[]", TTL).expect("Write should succeed");

        let content = fs::read_to_string(temp_dir.path().join("categories.json")).unwrap();
        let entry: CacheEntry = serde_json::from_str(&content).expect("Entry should parse");
        assert_eq!(entry.key, "categories");
        assert_eq!(entry.cached_at, written_at);
        assert_eq!(entry.expires_at, written_at + ChronoDuration::minutes(10));
    }

    #[test]
    fn test_concurrent_writers_leave_one_complete_entry() {
        let (store, _clock, _temp_dir) = create_test_store();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    store
                        .put("categories", &format!("[{}]", i), TTL)
                        .expect("Write should succeed");
                });
            }
        });

        let value = store.get("categories").unwrap().expect("Entry should exist");
        let parsed: Vec<u32> = serde_json::from_str(&value).expect("Value should be intact");
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(store) = FileCacheStore::new() {
            let path_str = store.cache_dir().to_string_lossy();
            assert!(path_str.contains("podcatalog"));
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }
}
