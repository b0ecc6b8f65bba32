use crate::error::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Envelope format version; entries with a different version are discarded.
const FORMAT_VERSION: u32 = 1;

/// Configuration for the cache store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled at all (a disabled store is inert)
    pub enabled: bool,

    /// Directory holding cache entries
    pub directory: PathBuf,

    /// Entries older than this are deleted when the store opens
    pub max_age_days: u64,

    /// Aggregate size cap; oldest entries are evicted past this
    pub max_size_mb: u64,

    /// Gzip-compress entries on disk
    pub compression: bool,

    /// Gzip level (1-9)
    pub compression_level: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".codescope-cache"),
            max_age_days: 30,
            max_size_mb: 500,
            compression: true,
            compression_level: 6,
        }
    }
}

/// Snapshot of the store's on-disk state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub enabled: bool,
    pub directory: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub compression: bool,
}

/// Serialized entry layout on disk
#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    key: String,
    content_hash: Option<String>,
    written_at: u64,
    value: serde_json::Value,
}

/// Content-hash-validated, size/age-bounded persistent KV store
#[derive(Debug, Clone)]
pub struct CacheStore {
    config: CacheConfig,
}

impl CacheStore {
    /// Open (and if necessary create) the store, applying the startup sweeps.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        if config.enabled {
            tokio::fs::create_dir_all(&config.directory).await?;

            let dir = config.directory.clone();
            let max_age_secs = config.max_age_days.saturating_mul(86_400);
            let max_bytes = config.max_size_mb.saturating_mul(1024 * 1024);
            let _ = tokio::task::spawn_blocking(move || {
                sweep_expired(&dir, max_age_secs);
                prune_oldest(&dir, max_bytes);
            })
            .await;
        }
        Ok(Self { config })
    }

    /// Look up a value. A supplied `expected_hash` that disagrees with the
    /// stored one deletes the entry and misses; so does any form of
    /// corruption.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        expected_hash: Option<&str>,
    ) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let path = self.entry_path(key);
        let bytes = tokio::fs::read(&path).await.ok()?;

        let Some(envelope) = decode_envelope(&bytes) else {
            log::warn!("Corrupted cache entry for {key}, removing");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        };

        if envelope.version != FORMAT_VERSION {
            log::debug!(
                "Cache entry for {key} has format version {}, removing",
                envelope.version
            );
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        if let Some(expected) = expected_hash {
            if envelope.content_hash.as_deref() != Some(expected) {
                log::debug!("Cache miss due to hash mismatch for {key}");
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        }

        match serde_json::from_value(envelope.value) {
            Ok(value) => {
                log::debug!("Cache hit for {key}");
                Some(value)
            }
            Err(err) => {
                log::warn!("Failed to decode cache value for {key}: {err}, removing");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    /// Store a value with its metadata, then re-apply the size cap.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        content_hash: Option<&str>,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let envelope = CacheEnvelope {
            version: FORMAT_VERSION,
            key: key.to_string(),
            content_hash: content_hash.map(str::to_string),
            written_at: now_unix(),
            value: serde_json::to_value(value)?,
        };

        let mut bytes = serde_json::to_vec(&envelope)?;
        if self.config.compression {
            bytes = compress_gzip(&bytes, self.config.compression_level)?;
        }

        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        if tokio::fs::rename(&tmp, &path).await.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        log::debug!("Cached {} bytes for {key}", bytes.len());

        let dir = self.config.directory.clone();
        let max_bytes = self.config.max_size_mb.saturating_mul(1024 * 1024);
        let _ = tokio::task::spawn_blocking(move || prune_oldest(&dir, max_bytes)).await;

        Ok(())
    }

    /// Wipe and recreate the store.
    pub async fn clear(&self) -> Result<()> {
        if self.config.directory.exists() {
            tokio::fs::remove_dir_all(&self.config.directory).await?;
        }
        tokio::fs::create_dir_all(&self.config.directory).await?;
        log::info!("Cache cleared");
        Ok(())
    }

    /// Report entry count, total size, cap, and flags.
    pub async fn info(&self) -> CacheInfo {
        let dir = self.config.directory.clone();
        let (entries, total_bytes) = tokio::task::spawn_blocking(move || {
            let mut entries = 0usize;
            let mut total = 0u64;
            for file in entry_files(&dir) {
                entries += 1;
                total += file.len;
            }
            (entries, total)
        })
        .await
        .unwrap_or((0, 0));

        CacheInfo {
            enabled: self.config.enabled,
            directory: self.config.directory.clone(),
            entries,
            total_bytes,
            max_bytes: self.config.max_size_mb.saturating_mul(1024 * 1024),
            compression: self.config.compression,
        }
    }

    /// Storage path for a logical key: SHA-256 truncated to a short
    /// fixed-width name. Collisions are theoretically possible at scale;
    /// accepted.
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hex = format!("{digest:x}");
        let name = format!("{}_{}", &hex[..8], &hex[hex.len() - 8..]);
        let extension = if self.config.compression {
            "json.gz"
        } else {
            "json"
        };
        self.config.directory.join(format!("{name}.{extension}"))
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn compress_gzip(bytes: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn decode_envelope(bytes: &[u8]) -> Option<CacheEnvelope> {
    let decoded = if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).ok()?;
        out
    } else {
        bytes.to_vec()
    };
    serde_json::from_slice(&decoded).ok()
}

#[derive(Clone)]
struct EntryFile {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

fn entry_files(dir: &Path) -> Vec<EntryFile> {
    let mut files = Vec::new();
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let is_entry = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".json") || n.ends_with(".json.gz"));
        if !is_entry {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        files.push(EntryFile {
            path,
            len: meta.len(),
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
        });
    }
    files
}

/// Delete entries whose mtime is older than `max_age_secs`.
fn sweep_expired(dir: &Path, max_age_secs: u64) {
    let now = SystemTime::now();
    for file in entry_files(dir) {
        let age_ms = now
            .duration_since(file.modified)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        if age_ms > u128::from(max_age_secs) * 1000 {
            if std::fs::remove_file(&file.path).is_ok() {
                log::debug!("Removed expired cache entry {}", file.path.display());
            }
        }
    }
}

/// Delete oldest entries until the directory fits under `max_bytes`.
fn prune_oldest(dir: &Path, max_bytes: u64) {
    let mut files = entry_files(dir);
    let mut total: u64 = files.iter().map(|f| f.len).sum();
    if total <= max_bytes {
        return;
    }
    files.sort_by(|a, b| a.modified.cmp(&b.modified));
    for file in files {
        if total <= max_bytes {
            break;
        }
        if std::fs::remove_file(&file.path).is_ok() {
            total = total.saturating_sub(file.len);
            log::debug!(
                "Removed cache entry {} to enforce size cap",
                file.path.display()
            );
        }
    }
}
