//! Storage backends that hold posting blocks and term-directory descriptors.
//!
//! Paths are `/`-separated and relative to the store root, e.g.
//! `body/body_index_000.bin`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{IndexError, Result};

pub trait BlockStore: Send + Sync {
    /// Returns the full contents of the object at `path`.
    fn fetch(&self, path: &str) -> Result<Arc<Vec<u8>>>;
    /// Replaces the object at `path`. Readers never observe a partial object.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;
    fn exists(&self, path: &str) -> Result<bool>;
    fn delete(&self, path: &str) -> Result<()>;
    /// All object paths starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Objects stored as plain files under a root directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlockStore for LocalStore {
    fn fetch(&self, path: &str) -> Result<Arc<Vec<u8>>> {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Arc::new(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(IndexError::NotFound { path: path.to_string() }),
            Err(e) => Err(IndexError::io(path, e)),
        }
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(path, e))?;
        }
        // write-then-rename keeps the swap atomic on a single filesystem
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| IndexError::io(path, e))?;
        fs::rename(&tmp, &target).map_err(|e| IndexError::io(path, e))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).is_file())
    }

    fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(IndexError::NotFound { path: path.to_string() }),
            Err(e) => Err(IndexError::io(path, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let (dir, file_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..i], &prefix[i + 1..]),
            None => ("", prefix),
        };
        let entries = match fs::read_dir(self.resolve(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IndexError::io(dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(file_prefix) && entry.path().is_file() {
                out.push(if dir.is_empty() { name } else { format!("{dir}/{name}") });
            }
        }
        out.sort();
        Ok(out)
    }
}

/// In-process store, mostly for tests and tooling.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl BlockStore for MemoryStore {
    fn fetch(&self, path: &str) -> Result<Arc<Vec<u8>>> {
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| IndexError::NotFound { path: path.to_string() })
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.objects.write().insert(path.to_string(), Arc::new(bytes.to_vec()));
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        match self.objects.write().remove(path) {
            Some(_) => Ok(()),
            None => Err(IndexError::NotFound { path: path.to_string() }),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out: Vec<String> = self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}

/// Keeps every fetched object in memory for the lifetime of the wrapper.
///
/// Blocks are write-once, so sharing the cache across queries cannot change results.
pub struct CachedStore<S> {
    inner: S,
    cache: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl<S: BlockStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cache: RwLock::new(HashMap::new()) }
    }

    pub fn cached_objects(&self) -> usize {
        self.cache.read().len()
    }
}

impl<S: BlockStore> BlockStore for CachedStore<S> {
    fn fetch(&self, path: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(hit) = self.cache.read().get(path) {
            return Ok(Arc::clone(hit));
        }
        let bytes = self.inner.fetch(path)?;
        self.cache.write().insert(path.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.cache.write().remove(path);
        self.inner.put(path, bytes)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        if self.cache.read().contains_key(path) {
            return Ok(true);
        }
        self.inner.exists(path)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.cache.write().remove(path);
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix)
    }
}

/// Read-only store over an HTTP(S) object-store endpoint, e.g. a public bucket.
pub struct HttpStore {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::io(base_url, std::io::Error::other(e)))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn map_err(path: &str, e: reqwest::Error) -> IndexError {
        if e.is_timeout() {
            IndexError::Timeout { path: path.to_string() }
        } else {
            IndexError::io(path, std::io::Error::other(e))
        }
    }
}

impl BlockStore for HttpStore {
    fn fetch(&self, path: &str) -> Result<Arc<Vec<u8>>> {
        tracing::debug!(path, "http fetch");
        let resp = self.client.get(self.url(path)).send().map_err(|e| Self::map_err(path, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound { path: path.to_string() });
        }
        let resp = resp.error_for_status().map_err(|e| Self::map_err(path, e))?;
        let bytes = resp.bytes().map_err(|e| Self::map_err(path, e))?;
        Ok(Arc::new(bytes.to_vec()))
    }

    fn put(&self, _path: &str, _bytes: &[u8]) -> Result<()> {
        Err(IndexError::Unsupported { op: "put" })
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let resp = self.client.head(self.url(path)).send().map_err(|e| Self::map_err(path, e))?;
        Ok(resp.status().is_success())
    }

    fn delete(&self, _path: &str) -> Result<()> {
        Err(IndexError::Unsupported { op: "delete" })
    }

    fn list(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(IndexError::Unsupported { op: "list" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_store_put_fetch_list_delete() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("body/idx_000.bin", b"abc").unwrap();
        store.put("body/idx_001.bin", b"de").unwrap();
        store.put("body/other.tdir", b"x").unwrap();

        assert_eq!(store.fetch("body/idx_000.bin").unwrap().as_slice(), b"abc");
        assert_eq!(store.list("body/idx_").unwrap(), vec!["body/idx_000.bin", "body/idx_001.bin"]);
        assert!(store.exists("body/other.tdir").unwrap());

        store.delete("body/idx_000.bin").unwrap();
        assert!(matches!(store.fetch("body/idx_000.bin"), Err(IndexError::NotFound { .. })));
        assert!(store.list("missing/idx_").unwrap().is_empty());
    }

    #[test]
    fn cached_store_serves_repeat_fetches_from_memory() {
        let cached = CachedStore::new(MemoryStore::new());
        cached.put("a.bin", b"123").unwrap();
        assert_eq!(cached.cached_objects(), 0);
        cached.fetch("a.bin").unwrap();
        cached.fetch("a.bin").unwrap();
        assert_eq!(cached.cached_objects(), 1);
        cached.delete("a.bin").unwrap();
        assert_eq!(cached.cached_objects(), 0);
        assert!(!cached.exists("a.bin").unwrap());
    }

    #[test]
    fn http_store_is_read_only() {
        let store = HttpStore::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        assert!(matches!(store.put("x", b""), Err(IndexError::Unsupported { op: "put" })));
        assert!(matches!(store.delete("x"), Err(IndexError::Unsupported { op: "delete" })));
        assert_eq!(store.url("/body/x.bin"), "http://127.0.0.1:9/body/x.bin");
    }

    #[test]
    fn stalled_fetch_is_a_retryable_timeout() {
        use crate::codec::{BlockLocation, PostingReader};
        use crate::persist::IndexPaths;

        // the kernel completes the handshake from the backlog; nothing ever answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let store = HttpStore::new(&base, Duration::from_millis(200)).unwrap();

        let err = store.fetch("body/x_000.bin").unwrap_err();
        assert!(matches!(err, IndexError::Timeout { ref path } if path == "body/x_000.bin"));
        assert!(err.is_retryable());

        let paths = IndexPaths::new("body", "x");
        let locs = vec![BlockLocation { block: "x_000.bin".into(), offset: 0 }];
        let err = PostingReader::new(&store).read(&paths, &locs, 6, 100).unwrap_err();
        assert!(matches!(err, IndexError::Timeout { .. }));
        drop(listener);
    }
}
