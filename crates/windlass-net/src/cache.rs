use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Metadata for one cached artifact: HTTP revalidation data plus expiry.
///
/// Obtained from [`MetaCache::resolve`], which also computes staleness; a
/// fresh (non-stale) entry lets a cache sink short-circuit the download
/// entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Namespace within the cache root, e.g. `assets`.
    pub base: String,
    /// Relative path of the artifact under its base.
    pub path: String,
    #[serde(default)]
    pub etag: String,
    /// `Last-Modified` value as received, kept verbatim for revalidation.
    #[serde(default)]
    pub last_modified: String,
    /// Epoch milliseconds after which the entry must be refetched. `None`
    /// means no expiry was advertised.
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub eternal: bool,
    /// Hex md5 of the cached artifact, recorded at commit time.
    #[serde(default)]
    pub md5sum: String,

    #[serde(skip)]
    local_path: PathBuf,
    #[serde(skip, default = "stale_default")]
    stale: bool,
}

fn stale_default() -> bool {
    true
}

impl CacheEntry {
    fn new(base: &str, path: &str, local_path: PathBuf) -> Self {
        Self {
            base: base.to_string(),
            path: path.to_string(),
            etag: String::new(),
            last_modified: String::new(),
            expires: None,
            eternal: false,
            md5sum: String::new(),
            local_path,
            stale: true,
        }
    }

    fn key(&self) -> String {
        format!("{}/{}", self.base, self.path)
    }

    /// Absolute location of the cached artifact.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// A stale entry requires a live fetch; a fresh one is a cache hit.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires.is_some_and(|at| at <= now_ms)
    }
}

const INDEX_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Store of cached artifacts with a JSON metadata index.
///
/// Artifacts live under `<root>/<base>/<path>`; the index records etag,
/// expiry and checksum per artifact. Shared across concurrent tasks behind
/// an `Arc`; the interior map is mutex-guarded.
pub struct MetaCache {
    root: PathBuf,
    index_path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MetaCache {
    /// Open (or create) a cache rooted at `root`, loading the index when one
    /// is present. A corrupt index is discarded with a warning rather than
    /// failing the whole cache.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let index_path = root.join("index.json");

        let mut entries = HashMap::new();
        if index_path.is_file() {
            match serde_json::from_slice::<IndexFile>(&fs::read(&index_path)?) {
                Ok(index) if index.version == INDEX_VERSION => {
                    for entry in index.entries {
                        entries.insert(entry.key(), entry);
                    }
                }
                Ok(index) => warn!(
                    "discarding cache index {} with unsupported version {}",
                    index_path.display(),
                    index.version
                ),
                Err(e) => warn!("discarding corrupt cache index {}: {}", index_path.display(), e),
            }
        }

        Ok(Self {
            root,
            index_path,
            entries: Mutex::new(entries),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up the entry for `<base>/<path>` and decide whether it is still
    /// usable.
    ///
    /// The entry is stale when it was never recorded, its artifact is gone,
    /// the caller expects a different etag, or a recorded expiry has passed
    /// on a non-eternal entry.
    pub fn resolve(&self, base: &str, path: &str, expected_etag: Option<&str>) -> CacheEntry {
        let local_path = self.root.join(base).join(path);
        let key = format!("{base}/{path}");

        let Some(mut entry) = self.entries.lock().unwrap().get(&key).cloned() else {
            debug!("no cache record for {}", key);
            return CacheEntry::new(base, path, local_path);
        };
        entry.local_path = local_path;
        entry.stale = true;

        if !entry.local_path.is_file() {
            debug!("cached artifact for {} is missing", key);
            return entry;
        }
        if let Some(expected) = expected_etag {
            if expected != entry.etag {
                debug!("cached artifact for {} has a different etag", key);
                return entry;
            }
        }
        if entry.eternal || !entry.is_expired(Utc::now().timestamp_millis()) {
            entry.stale = false;
        }
        entry
    }

    /// Record an updated entry and persist the index.
    pub fn commit(&self, mut entry: CacheEntry) -> Result<()> {
        entry.stale = false;
        let mut entries = self.entries.lock().unwrap();
        entries.insert(entry.key(), entry);

        let mut snapshot: Vec<CacheEntry> = entries.values().cloned().collect();
        snapshot.sort_by_key(CacheEntry::key);
        let json =
            serde_json::to_vec_pretty(&IndexFile { version: INDEX_VERSION, entries: snapshot })?;

        // temp-and-rename so a crash mid-write cannot corrupt the index
        let temp = self.root.join(".index.json.tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.index_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_artifact(entry: &CacheEntry, content: &[u8]) {
        fs::create_dir_all(entry.local_path().parent().unwrap()).unwrap();
        fs::write(entry.local_path(), content).unwrap();
    }

    #[test]
    fn test_unknown_entry_is_stale() {
        let dir = tempdir().unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();
        let entry = cache.resolve("assets", "icons/logo.png", None);
        assert!(entry.is_stale());
        assert!(entry.local_path().starts_with(dir.path()));
    }

    #[test]
    fn test_commit_then_resolve_is_fresh() {
        let dir = tempdir().unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();

        let mut entry = cache.resolve("assets", "icons/logo.png", None);
        write_artifact(&entry, b"png bytes");
        entry.etag = "\"abc\"".to_string();
        cache.commit(entry).unwrap();

        let resolved = cache.resolve("assets", "icons/logo.png", None);
        assert!(!resolved.is_stale());
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let dir = tempdir().unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();

        let entry = cache.resolve("assets", "icons/logo.png", None);
        cache.commit(entry).unwrap();

        // recorded, but the artifact never hit the disk
        assert!(cache.resolve("assets", "icons/logo.png", None).is_stale());
    }

    #[test]
    fn test_etag_mismatch_is_stale() {
        let dir = tempdir().unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();

        let mut entry = cache.resolve("assets", "icons/logo.png", None);
        write_artifact(&entry, b"png bytes");
        entry.etag = "\"abc\"".to_string();
        cache.commit(entry).unwrap();

        assert!(cache.resolve("assets", "icons/logo.png", Some("\"def\"")).is_stale());
        assert!(!cache.resolve("assets", "icons/logo.png", Some("\"abc\"")).is_stale());
    }

    #[test]
    fn test_expired_entry_is_stale_unless_eternal() {
        let dir = tempdir().unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();

        let mut entry = cache.resolve("assets", "icons/logo.png", None);
        write_artifact(&entry, b"png bytes");
        entry.expires = Some(Utc::now().timestamp_millis() - 1_000);
        cache.commit(entry).unwrap();
        assert!(cache.resolve("assets", "icons/logo.png", None).is_stale());

        let mut entry = cache.resolve("assets", "icons/logo.png", None);
        entry.eternal = true;
        cache.commit(entry).unwrap();
        assert!(!cache.resolve("assets", "icons/logo.png", None).is_stale());
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let cache = MetaCache::open(dir.path()).unwrap();
            let mut entry = cache.resolve("meta", "versions.json", None);
            write_artifact(&entry, b"{}");
            entry.etag = "\"v1\"".to_string();
            entry.md5sum = "99914b932bd37a50b983c5e7c90ae93b".to_string();
            cache.commit(entry).unwrap();
        }

        let cache = MetaCache::open(dir.path()).unwrap();
        let entry = cache.resolve("meta", "versions.json", None);
        assert!(!entry.is_stale());
        assert_eq!(entry.etag, "\"v1\"");
        assert_eq!(entry.md5sum, "99914b932bd37a50b983c5e7c90ae93b");
    }

    #[test]
    fn test_corrupt_index_is_discarded() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.json"), b"not json at all").unwrap();
        let cache = MetaCache::open(dir.path()).unwrap();
        assert!(cache.resolve("assets", "anything", None).is_stale());
    }
}
