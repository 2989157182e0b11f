//! File-backed response cache keyed by URL.
//!
//! Each URL maps to one artifact: `<url with '/'→'_' and ':'→'+'>.cache`
//! under the cache directory. Distinct URLs that sanitize to the same name
//! share an artifact. There is no eviction and no writer locking; the last
//! writer wins.
//!
//! Writes go to a temporary file next to the artifact and are renamed into
//! place only by `CacheSink::finish`, so readers never see a partial response.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::CacheConfig;

/// `If-Modified-Since` value sent when no usable artifact exists.
pub const NEVER_CACHED: &str = "Thu, 01 Jul 1970 20:00:00 GMT";

const ARTIFACT_SUFFIX: &str = ".cache";
const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Artifact file name for a URL.
pub fn sanitize(url: &str) -> String {
    let mut name = url.replace('/', "_").replace(':', "+");
    name.push_str(ARTIFACT_SUFFIX);
    name
}

/// Maps URLs to artifact files under a root directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.directory.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache directory if it does not exist yet.
    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Deterministic artifact location for `url`.
    pub fn artifact_path(&self, url: &str) -> PathBuf {
        self.root.join(sanitize(url))
    }

    /// An artifact is usable when it exists and is not empty.
    pub async fn is_fresh(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() != 0,
            Err(_) => false,
        }
    }

    /// Modification time of the artifact as an RFC 1123 date in GMT.
    pub async fn last_modified_http_date(&self, path: &Path) -> io::Result<String> {
        let modified = fs::metadata(path).await?.modified()?;
        Ok(httpdate::fmt_http_date(modified))
    }

    /// Date for the conditional request: the artifact's modification time when
    /// it is usable, the sentinel otherwise.
    pub async fn conditional_date(&self, path: &Path) -> String {
        if !self.is_fresh(path).await {
            return NEVER_CACHED.to_string();
        }
        match self.last_modified_http_date(path).await {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Cannot read artifact timestamp");
                NEVER_CACHED.to_string()
            }
        }
    }

    pub async fn open_for_read(&self, path: &Path) -> io::Result<File> {
        File::open(path).await
    }

    /// Start a replacement for the artifact at `path`.
    ///
    /// The current artifact stays in place until the sink is finished.
    pub async fn open_for_write(&self, path: &Path) -> io::Result<CacheSink> {
        let temp_path = temp_path_for(path);
        let file = File::create(&temp_path).await?;
        Ok(CacheSink {
            writer: BufWriter::new(file),
            temp_path: Some(temp_path),
            final_path: path.to_path_buf(),
            written: 0,
        })
    }
}

/// `<artifact>.<pid>-<n>.tmp`, unique across concurrent writers.
fn temp_path_for(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}-{}{}", std::process::id(), n, TEMP_SUFFIX));
    PathBuf::from(name)
}

/// Buffered writer for a replacement artifact.
///
/// Nothing is visible at the artifact path until `finish`. A sink that is
/// discarded or dropped removes its temporary file.
#[derive(Debug)]
pub struct CacheSink {
    writer: BufWriter<File>,
    /// `None` once committed or discarded.
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    written: u64,
}

impl CacheSink {
    pub async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flush and move the replacement into place, returning the artifact size.
    pub async fn finish(mut self) -> io::Result<u64> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        if let Some(temp_path) = self.temp_path.take() {
            if let Err(e) = fs::rename(&temp_path, &self.final_path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        }
        Ok(self.written)
    }

    /// Drop the replacement; the current artifact is left as it was.
    pub async fn discard(mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            if let Err(e) = fs::remove_file(&temp_path).await {
                tracing::warn!(path = ?temp_path, error = %e, "Cannot remove temporary artifact");
            }
        }
    }
}

impl Drop for CacheSink {
    fn drop(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            let _ = std::fs::remove_file(&temp_path);
            tracing::debug!(path = ?temp_path, "Unfinished artifact removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[test]
    fn artifact_names_are_sanitized() {
        assert_eq!(sanitize("http://a/b:c"), "http+__a_b+c.cache");
        assert_eq!(sanitize("http://x.com/"), "http+__x.com_.cache");
    }

    #[test]
    fn artifact_path_is_deterministic() {
        let store = CacheStore::new("/tmp/cache");
        let first = store.artifact_path("http://a/b:c");
        let second = store.artifact_path("http://a/b:c");
        assert_eq!(first, second);
        assert_eq!(first, Path::new("/tmp/cache/http+__a_b+c.cache"));
    }

    #[test]
    fn colliding_urls_share_an_artifact() {
        let store = CacheStore::new(".");
        assert_eq!(store.artifact_path("http://a/b"), store.artifact_path("http+__a/b"));
    }

    #[tokio::test]
    async fn freshness_requires_content() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.artifact_path("http://example.com/");

        assert!(!store.is_fresh(&path).await);
        assert_eq!(store.conditional_date(&path).await, NEVER_CACHED);

        std::fs::write(&path, b"").unwrap();
        assert!(!store.is_fresh(&path).await);
        assert_eq!(store.conditional_date(&path).await, NEVER_CACHED);

        std::fs::write(&path, b"HTTP/1.1 200 OK\r\n\r\nhi").unwrap();
        assert!(store.is_fresh(&path).await);
    }

    #[tokio::test]
    async fn last_modified_is_gmt_http_date() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.artifact_path("http://example.com/");

        let file = std::fs::File::create(&path).unwrap();
        std::io::Write::write_all(&mut &file, b"cached").unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(784_111_777)).unwrap();
        drop(file);

        let date = store.last_modified_http_date(&path).await.unwrap();
        assert_eq!(date, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(store.conditional_date(&path).await, date);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn sink_replaces_artifact_only_on_finish() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.artifact_path("http://example.com/page");
        std::fs::write(&path, b"a much longer stale artifact").unwrap();

        let mut sink = store.open_for_write(&path).await.unwrap();
        sink.write(b"fresh ").await.unwrap();
        sink.write(b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"a much longer stale artifact");
        assert_eq!(sink.finish().await.unwrap(), 11);
        assert_eq!(entries(dir.path()), vec![sanitize("http://example.com/page")]);

        let mut contents = Vec::new();
        store
            .open_for_read(&path)
            .await
            .unwrap()
            .read_to_end(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, b"fresh bytes");
    }

    #[tokio::test]
    async fn discarded_sink_keeps_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.artifact_path("http://example.com/page");
        std::fs::write(&path, b"complete response").unwrap();

        let mut sink = store.open_for_write(&path).await.unwrap();
        sink.write(b"partial").await.unwrap();
        sink.discard().await;

        assert_eq!(std::fs::read(&path).unwrap(), b"complete response");
        assert_eq!(entries(dir.path()), vec![sanitize("http://example.com/page")]);
    }

    #[tokio::test]
    async fn dropped_sink_leaves_no_artifact() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let path = store.artifact_path("http://example.com/new");

        let mut sink = store.open_for_write(&path).await.unwrap();
        sink.write(b"partial").await.unwrap();
        drop(sink);

        assert!(!path.exists());
        assert!(!store.is_fresh(&path).await);
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn temp_paths_are_unique_siblings() {
        let path = Path::new("/tmp/cache/http+__a_.cache");
        let first = temp_path_for(path);
        let second = temp_path_for(path);
        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        assert!(first.to_string_lossy().ends_with(".tmp"));
    }

    #[tokio::test]
    async fn ensure_root_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("nested/cache"));
        store.ensure_root().await.unwrap();
        assert!(store.root().is_dir());
    }
}
