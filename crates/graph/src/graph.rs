use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::extract::{self, ExtractedElement};
use crate::scanner::FileScanner;
use crate::testgen;
use crate::types::{CodeUnit, QualityReport, RunSummary, SummaryAggregate, UnitKind};
use codescope_cache_store::CacheStore;
use codescope_embedding::{cosine_similarity, EmbeddingGenerator, EmbeddingModel};
use codescope_metrics::MetricsAnalyzer;
use codescope_parser::{
    parse_source, BoundedParser, ErrorKind, ErrorLog, ErrorReport, ErrorSummary,
    ParseDisposition, ParsedFile, Severity,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run summaries kept in the in-memory history
const HISTORY_CAP: usize = 100;

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+([A-Za-z_][\w.]*)\s+import|import\s+([A-Za-z_][\w.]*(?:\s*,\s*[A-Za-z_][\w.]*)*))")
        .expect("static import regex")
});

static CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("static call regex"));

/// What happened to one file
enum FileOutcome {
    Analyzed {
        units: Vec<CodeUnit>,
        from_cache: bool,
    },
    Skipped,
    Failed,
}

/// A worker's complete result, returned by value to the coordinator
struct FileAnalysis {
    path: String,
    outcome: FileOutcome,
    reports: Vec<ErrorReport>,
}

/// The shared, read-only analysis pipeline handed to workers
struct AnalysisPipeline {
    config: Config,
    parser: BoundedParser,
    analyzer: MetricsAnalyzer,
    embedder: EmbeddingGenerator,
    cache: CacheStore,
}

impl AnalysisPipeline {
    /// Analyze one file: cache lookup, bounded parse, metric analysis, unit
    /// extraction, cache store. Self-contained; never touches shared tables.
    async fn process_file(&self, path: &Path) -> FileAnalysis {
        let display = path.display().to_string();
        let mut reports = Vec::new();

        let content_hash = match tokio::fs::read(path).await {
            Ok(bytes) => Some(sha256_hex(&bytes)),
            // Unreadable files get their Io report from the parser below
            Err(_) => None,
        };

        let cache_key = format!("analysis:{display}");
        if let Some(hash) = &content_hash {
            if let Some(units) = self
                .cache
                .get::<Vec<CodeUnit>>(&cache_key, Some(hash))
                .await
            {
                log::debug!("Cache hit for {display}");
                return FileAnalysis {
                    path: display,
                    outcome: FileOutcome::Analyzed {
                        units,
                        from_cache: true,
                    },
                    reports,
                };
            }
        }

        let parse = self.parser.parse_file(path).await;
        reports.extend(parse.reports);

        let outcome = match parse.disposition {
            ParseDisposition::Skipped => FileOutcome::Skipped,
            ParseDisposition::Failed => FileOutcome::Failed,
            ParseDisposition::Parsed(parsed) => {
                let hash = content_hash
                    .clone()
                    .unwrap_or_else(|| sha256_hex(parsed.text.as_bytes()));
                let units = self.build_units(path, &display, &parsed, &hash);
                if let Err(err) = self.cache.set(&cache_key, &units, Some(&hash)).await {
                    log::warn!("Failed to cache analysis for {display}: {err}");
                }
                FileOutcome::Analyzed {
                    units,
                    from_cache: false,
                }
            }
        };

        FileAnalysis {
            path: display,
            outcome,
            reports,
        }
    }

    /// Materialize the file unit plus every extracted nested unit.
    fn build_units(
        &self,
        path: &Path,
        display: &str,
        parsed: &ParsedFile,
        content_hash: &str,
    ) -> Vec<CodeUnit> {
        let now = now_unix();
        let mtime = file_mtime(path);
        let file_id = format!("file:{display}:{mtime}");

        let elements = extract::extract_elements(&parsed.tree, &parsed.text);
        let ids: Vec<String> = elements
            .iter()
            .map(|e| {
                format!(
                    "{}:{display}:{}:{}",
                    e.kind.id_prefix(),
                    e.qualified,
                    e.start_line
                )
            })
            .collect();

        let mut units = Vec::with_capacity(elements.len() + 1);

        let file_metrics = self.analyzer.analyze(&parsed.text, Some(&parsed.tree));
        units.push(CodeUnit {
            id: file_id.clone(),
            kind: UnitKind::File,
            source: parsed.text.clone(),
            content_hash: content_hash.to_string(),
            purpose: format!("File: {display}"),
            file_path: display.to_string(),
            start_line: Some(1),
            end_line: Some(parsed.text.lines().count().max(1)),
            metrics: file_metrics,
            test_skeletons: Vec::new(),
            embedding: Some(self.embedder.embed(&parsed.text, Some(&parsed.tree))),
            created_at: now,
            updated_at: now,
            parent_id: None,
            child_ids: elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.parent.is_none())
                .map(|(j, _)| ids[j].clone())
                .collect(),
            tags: vec!["file".to_string(), "py".to_string()],
            documentation: extract::module_docstring(&parsed.tree, &parsed.text),
        });

        for (i, element) in elements.iter().enumerate() {
            let parent_id = element
                .parent
                .map_or_else(|| file_id.clone(), |p| ids[p].clone());
            let child_ids: Vec<String> = elements
                .iter()
                .enumerate()
                .filter(|(_, other)| other.parent == Some(i))
                .map(|(j, _)| ids[j].clone())
                .collect();
            units.push(self.materialize(element, &ids[i], display, parent_id, child_ids, now));
        }

        units
    }

    fn materialize(
        &self,
        element: &ExtractedElement,
        id: &str,
        display: &str,
        parent_id: String,
        child_ids: Vec<String>,
        now: u64,
    ) -> CodeUnit {
        // Nested constructs are scored independently; their dedented text
        // re-parses on its own
        let tree = parse_source(&element.text);
        let metrics = self.analyzer.analyze(&element.text, tree.as_ref());
        let embedding = self.embedder.embed(&element.text, tree.as_ref());

        let test_skeletons = if self.config.analysis.generate_tests {
            match element.kind {
                UnitKind::Function | UnitKind::AsyncFunction => testgen::function_skeletons(
                    &element.name,
                    &element.params,
                    element.has_exception_handling,
                ),
                UnitKind::Class => {
                    testgen::class_skeletons(&element.name, &element.public_methods)
                }
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };

        CodeUnit {
            id: id.to_string(),
            kind: element.kind,
            content_hash: sha256_hex(element.text.as_bytes()),
            source: element.text.clone(),
            purpose: format!("{}: {}", purpose_label(element.kind), element.qualified),
            file_path: display.to_string(),
            start_line: Some(element.start_line),
            end_line: Some(element.end_line),
            metrics,
            test_skeletons,
            embedding: Some(embedding),
            created_at: now,
            updated_at: now,
            parent_id: Some(parent_id),
            child_ids,
            tags: element.tags.clone(),
            documentation: element.docstring.clone(),
        }
    }
}

/// Orchestrates project analysis and owns the resulting graph: node table,
/// edge table, file registry, run history, and error log.
pub struct CodeGraph {
    config: Config,
    pipeline: Arc<AnalysisPipeline>,
    nodes: HashMap<String, CodeUnit>,
    edges: HashMap<String, Vec<String>>,
    file_registry: HashMap<String, Vec<String>>,
    history: Vec<RunSummary>,
    error_log: ErrorLog,
    last_save: Instant,
}

impl CodeGraph {
    /// Build a graph from an immutable configuration and an optional external
    /// embedding model.
    pub async fn new(config: Config, model: Option<Box<dyn EmbeddingModel>>) -> Result<Self> {
        config.validate()?;

        let cache = CacheStore::open(config.cache.clone()).await?;
        let parser = BoundedParser::new(config.parse_limits());
        let analyzer = MetricsAnalyzer::new(config.metrics.clone());
        let embedder = EmbeddingGenerator::new(config.embedding.clone(), model)?;

        let pipeline = Arc::new(AnalysisPipeline {
            config: config.clone(),
            parser,
            analyzer,
            embedder,
            cache,
        });

        Ok(Self {
            config,
            pipeline,
            nodes: HashMap::new(),
            edges: HashMap::new(),
            file_registry: HashMap::new(),
            history: Vec::new(),
            error_log: ErrorLog::new(),
            last_save: Instant::now(),
        })
    }

    /// Analyze every matching file under `root`. A single file's failure or
    /// timeout is recorded and counted, never aborts the run; only
    /// enumeration and persistence errors surface here.
    pub async fn analyze_project(&mut self, root: impl AsRef<Path>) -> Result<RunSummary> {
        let start = Instant::now();
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(GraphError::InvalidPath(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let files = FileScanner::new(root, &self.config.analysis)?.scan();
        let timeout = Duration::from_secs(self.config.analysis.timeout_per_file_secs);

        let analyses = if self.config.analysis.parallel {
            self.run_parallel(files, timeout).await
        } else {
            let mut collected = Vec::new();
            for path in files {
                collected.push(run_time_boxed(&self.pipeline, &path, timeout).await);
            }
            collected
        };

        // Single-writer merge: workers returned results by value, only this
        // task touches the tables
        let mut files_analyzed = 0usize;
        let mut files_failed = 0usize;
        let mut files_skipped = 0usize;
        let mut nodes_created = 0usize;

        for analysis in analyses {
            self.error_log.extend(analysis.reports);
            match analysis.outcome {
                FileOutcome::Analyzed { units, from_cache } => {
                    files_analyzed += 1;
                    if from_cache {
                        log::debug!("Restored {} from cache", analysis.path);
                    }
                    let ids: Vec<String> = units.iter().map(|u| u.id.clone()).collect();
                    nodes_created += units.len();
                    for unit in units {
                        self.nodes.insert(unit.id.clone(), unit);
                    }
                    self.file_registry.insert(analysis.path, ids);
                }
                FileOutcome::Skipped => files_skipped += 1,
                FileOutcome::Failed => files_failed += 1,
            }
        }

        let edges_created = self.link_dependencies();

        if self.config.persistence.auto_save && self.save_interval_elapsed() {
            let state_file = self.config.persistence.state_file.clone();
            self.save(&state_file).await?;
        }

        #[allow(clippy::cast_possible_truncation)]
        let summary = RunSummary {
            project_path: root.display().to_string(),
            files_analyzed,
            files_failed,
            files_skipped,
            nodes_created,
            edges_created,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: now_unix(),
            aggregate: self.aggregate(),
        };

        self.history.push(summary.clone());
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }

        log::info!(
            "Run complete: {} analyzed, {} failed, {} skipped, {} nodes, {} edges",
            files_analyzed,
            files_failed,
            files_skipped,
            nodes_created,
            edges_created
        );
        Ok(summary)
    }

    async fn run_parallel(
        &self,
        files: Vec<std::path::PathBuf>,
        timeout: Duration,
    ) -> Vec<FileAnalysis> {
        let semaphore = Arc::new(Semaphore::new(self.config.analysis.max_workers.max(1)));
        let mut join_set = JoinSet::new();

        for path in files {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                // The semaphore is never closed; acquisition cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                run_time_boxed(&pipeline, &path, timeout).await
            });
        }

        // Collected as results complete, not in submission order
        let mut collected = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(analysis) => collected.push(analysis),
                Err(err) => log::error!("Analysis worker panicked: {err}"),
            }
        }
        collected
    }

    /// Post-hoc dependency pass: re-scan every unit's text for import
    /// statements and bare-name calls, adding a directed edge to every other
    /// unit whose file path or purpose label contains the referenced name.
    /// Intentionally approximate; duplicate edges are kept.
    fn link_dependencies(&mut self) -> usize {
        let catalog: Vec<(String, String, String)> = self
            .nodes
            .values()
            .map(|u| (u.id.clone(), u.file_path.clone(), u.purpose.clone()))
            .collect();

        let mut created = 0usize;
        let references: Vec<(String, Vec<String>, Vec<String>)> = self
            .nodes
            .values()
            .map(|u| (u.id.clone(), import_names(&u.source), call_names(&u.source)))
            .collect();

        for (id, imports, calls) in references {
            for import in &imports {
                for (other_id, other_path, _) in &catalog {
                    if *other_id != id && other_path.contains(import.as_str()) {
                        self.edges.entry(id.clone()).or_default().push(other_id.clone());
                        created += 1;
                    }
                }
            }
            for call in &calls {
                for (other_id, _, other_purpose) in &catalog {
                    if *other_id != id && other_purpose.contains(call.as_str()) {
                        self.edges.entry(id.clone()).or_default().push(other_id.clone());
                        created += 1;
                    }
                }
            }
        }

        created
    }

    fn aggregate(&self) -> SummaryAggregate {
        let total_nodes = self.nodes.len();
        if total_nodes == 0 {
            return SummaryAggregate {
                total_files: self.file_registry.len(),
                total_edges: self.edges.values().map(Vec::len).sum(),
                ..Default::default()
            };
        }

        let mut total_loc = 0usize;
        let mut total_complexity = 0u64;
        let mut quality_sum = 0.0f64;
        let mut security_issue_count = 0usize;
        let mut code_smell_count = 0usize;
        let mut dependencies: HashSet<&str> = HashSet::new();

        for unit in self.nodes.values() {
            total_loc += unit.metrics.lines_of_code;
            total_complexity += u64::from(unit.metrics.cyclomatic_complexity);
            quality_sum += unit.quality_score();
            security_issue_count += unit.metrics.security_findings.len();
            code_smell_count += unit.metrics.code_smells.len();
            for dep in &unit.metrics.dependencies {
                dependencies.insert(dep);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let node_total = total_nodes as f64;
        #[allow(clippy::cast_precision_loss)]
        let complexity_total = total_complexity as f64;

        SummaryAggregate {
            total_files: self.file_registry.len(),
            total_nodes,
            total_edges: self.edges.values().map(Vec::len).sum(),
            total_loc,
            average_complexity: complexity_total / node_total,
            average_quality_score: quality_sum / node_total,
            security_issue_count,
            code_smell_count,
            distinct_dependency_count: dependencies.len(),
        }
    }

    /// Linear similarity scan over all embedded units, descending by score.
    #[must_use]
    pub fn similar(&self, unit_id: &str, threshold: f32) -> Vec<(String, f32)> {
        let Some(target) = self.nodes.get(unit_id) else {
            return Vec::new();
        };
        let Some(embedding) = &target.embedding else {
            return Vec::new();
        };

        let mut results: Vec<(String, f32)> = self
            .nodes
            .iter()
            .filter(|(id, _)| id.as_str() != unit_id)
            .filter_map(|(id, other)| {
                other
                    .embedding
                    .as_ref()
                    .map(|e| (id.clone(), cosine_similarity(embedding, e)))
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results
    }

    /// Per-unit quality report with its top similar units.
    #[must_use]
    pub fn quality_report(&self, unit_id: &str) -> Option<QualityReport> {
        let unit = self.nodes.get(unit_id)?;
        Some(QualityReport {
            unit_id: unit_id.to_string(),
            purpose: unit.purpose.clone(),
            quality_score: unit.quality_score(),
            metrics: unit.metrics.clone(),
            has_documentation: unit.documentation.is_some(),
            tags: unit.tags.clone(),
            dependencies: unit.metrics.dependencies.clone(),
            child_count: unit.child_ids.len(),
            similar_units: self.similar(unit_id, 0.9).into_iter().take(5).collect(),
        })
    }

    #[must_use]
    pub fn node(&self, unit_id: &str) -> Option<&CodeUnit> {
        self.nodes.get(unit_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CodeUnit> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn history(&self) -> &[RunSummary] {
        &self.history
    }

    #[must_use]
    pub fn error_summary(&self) -> ErrorSummary {
        self.error_log.summary()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the backing cache store's state.
    pub async fn cache_info(&self) -> codescope_cache_store::CacheInfo {
        self.pipeline.cache.info().await
    }

    /// Wipe the backing cache store.
    pub async fn clear_cache(&self) -> Result<()> {
        self.pipeline.cache.clear().await?;
        Ok(())
    }

    fn save_interval_elapsed(&self) -> bool {
        self.last_save.elapsed() >= Duration::from_secs(self.config.persistence.save_interval_secs)
    }

    // persist.rs reaches into the tables for save/load
    pub(crate) fn tables_mut(
        &mut self,
    ) -> (
        &mut HashMap<String, CodeUnit>,
        &mut HashMap<String, Vec<String>>,
        &mut HashMap<String, Vec<String>>,
        &mut Vec<RunSummary>,
    ) {
        (
            &mut self.nodes,
            &mut self.edges,
            &mut self.file_registry,
            &mut self.history,
        )
    }

    pub(crate) fn tables(
        &self,
    ) -> (
        &HashMap<String, CodeUnit>,
        &HashMap<String, Vec<String>>,
        &HashMap<String, Vec<String>>,
        &[RunSummary],
        &ErrorLog,
    ) {
        (
            &self.nodes,
            &self.edges,
            &self.file_registry,
            &self.history,
            &self.error_log,
        )
    }

    pub(crate) fn mark_saved(&mut self) {
        self.last_save = Instant::now();
    }
}

async fn run_time_boxed(
    pipeline: &AnalysisPipeline,
    path: &Path,
    timeout: Duration,
) -> FileAnalysis {
    let display = path.display().to_string();
    match tokio::time::timeout(timeout, pipeline.process_file(path)).await {
        Ok(analysis) => analysis,
        Err(_) => FileAnalysis {
            path: display.clone(),
            outcome: FileOutcome::Failed,
            reports: vec![ErrorReport::new(
                display,
                ErrorKind::Timeout,
                Severity::Error,
                format!("File processing timed out after {timeout:?}"),
            )],
        },
    }
}

const fn purpose_label(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::File => "File",
        UnitKind::Class => "Class",
        UnitKind::Function => "Function",
        UnitKind::AsyncFunction => "Async Function",
        UnitKind::Method => "Method",
    }
}

fn import_names(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for captures in IMPORT_RE.captures_iter(source) {
        if let Some(module) = captures.get(1) {
            names.push(module.as_str().to_string());
        } else if let Some(list) = captures.get(2) {
            for module in list.as_str().split(',') {
                let module = module.trim();
                if !module.is_empty() {
                    names.push(module.to_string());
                }
            }
        }
    }
    names
}

fn call_names(source: &str) -> Vec<String> {
    CALL_RE
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_mtime(path: &Path) -> u64 {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn import_names_cover_both_forms() {
        let source = "import os\nimport sys, json\nfrom pathlib import Path\n";
        assert_eq!(import_names(source), vec!["os", "sys", "json", "pathlib"]);
    }

    #[test]
    fn call_names_find_bare_calls() {
        let source = "result = compute(x)\nhelper ()\nobj.method(y)\n";
        let names = call_names(source);
        assert!(names.contains(&"compute".to_string()));
        assert!(names.contains(&"helper".to_string()));
        assert!(names.contains(&"method".to_string()));
    }

    #[test]
    fn purpose_labels_match_kinds() {
        assert_eq!(purpose_label(UnitKind::AsyncFunction), "Async Function");
        assert_eq!(purpose_label(UnitKind::Method), "Method");
    }
}
