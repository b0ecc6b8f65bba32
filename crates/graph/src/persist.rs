use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::{CodeUnit, GraphState, STATE_FORMAT_VERSION};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

impl CodeGraph {
    /// Persist the full graph state. Rotates up to `backup_count` timestamped
    /// backups of the existing file first; compresses the payload when the
    /// cache compression flag is on.
    pub async fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let backup_count = self.config().persistence.backup_count;
        if backup_count > 0 && path.exists() {
            if let Err(err) = rotate_backups(path, backup_count) {
                log::warn!("Failed to create backup of {}: {err}", path.display());
            }
        }

        let state = self.to_state();
        let mut bytes = serde_json::to_vec_pretty(&state)?;
        if self.config().cache.compression {
            let level = self.config().cache.compression_level;
            bytes = compress_gzip(&bytes, level)?;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        self.mark_saved();
        log::info!(
            "State saved to {} ({} nodes, {} bytes)",
            path.display(),
            self.node_count(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a persisted state, replacing the in-memory tables. Compression is
    /// detected from the payload; a version mismatch is logged, not fatal; a
    /// malformed node record is skipped, never aborts the load.
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let decoded = if bytes.starts_with(&GZIP_MAGIC) {
            let mut out = Vec::new();
            GzDecoder::new(bytes.as_slice()).read_to_end(&mut out)?;
            out
        } else {
            bytes
        };

        let state: GraphState = serde_json::from_slice(&decoded)?;
        if state.version != STATE_FORMAT_VERSION {
            log::warn!(
                "Loading state with format version {} (current is {})",
                state.version,
                STATE_FORMAT_VERSION
            );
        }

        let (nodes, edges, file_registry, history) = self.tables_mut();
        nodes.clear();
        let mut skipped = 0usize;
        for (id, value) in state.nodes {
            match serde_json::from_value::<CodeUnit>(value) {
                Ok(unit) => {
                    nodes.insert(id, unit);
                }
                Err(err) => {
                    skipped += 1;
                    log::error!("Skipping malformed node record {id}: {err}");
                }
            }
        }
        *edges = state.edges;
        *file_registry = state.file_registry;
        *history = state.history;

        log::info!(
            "State loaded from {}: {} nodes ({} malformed records skipped)",
            path.display(),
            self.node_count(),
            skipped
        );
        Ok(())
    }

    /// Final teardown: per-run worker sets are already drained when
    /// `analyze_project` returns, so the remaining duty is the closing save.
    pub async fn cleanup(&mut self) -> Result<()> {
        if self.config().persistence.auto_save {
            let state_file = self.config().persistence.state_file.clone();
            self.save(&state_file).await?;
        }
        Ok(())
    }

    fn to_state(&self) -> GraphState {
        let (nodes, edges, file_registry, history, error_log) = self.tables();

        let mut node_records = serde_json::Map::new();
        for (id, unit) in nodes {
            match serde_json::to_value(unit) {
                Ok(value) => {
                    node_records.insert(id.clone(), value);
                }
                Err(err) => log::error!("Failed to serialize node {id}: {err}"),
            }
        }

        GraphState {
            version: STATE_FORMAT_VERSION.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            config: self.config().clone(),
            nodes: node_records,
            edges: edges.clone(),
            file_registry: file_registry.clone(),
            history: history.to_vec(),
            error_summary: error_log.summary(),
        }
    }
}

/// Copy the current state file into `backups/` with a timestamped name, then
/// delete the oldest backups past `max_backups`.
fn rotate_backups(path: &Path, max_backups: usize) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent.join("backups");
    std::fs::create_dir_all(&backup_dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "state".to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("{stem}_{timestamp}{extension}"));
    std::fs::copy(path, &backup_path)?;
    log::info!("Backup created: {}", backup_path.display());

    // Timestamped names sort chronologically
    let mut backups: Vec<_> = std::fs::read_dir(&backup_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&format!("{stem}_")))
        })
        .collect();
    backups.sort();

    if backups.len() > max_backups {
        let excess = backups.len() - max_backups;
        for old in &backups[..excess] {
            if std::fs::remove_file(old).is_ok() {
                log::debug!("Removed old backup: {}", old.display());
            }
        }
    }

    Ok(())
}

fn compress_gzip(bytes: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder.write_all(bytes)?;
    encoder.finish()
}
