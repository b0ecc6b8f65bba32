use crate::error::{ParserError, Result};
use crate::limits::{check_memory, MemoryStatus, ParseLimits};
use crate::recovery;
use crate::report::{ErrorKind, ErrorReport, Severity};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Lines kept when the memory recovery rung truncates a file
const MEMORY_RECOVERY_LINE_CAP: usize = 1000;

/// UTF-8 byte-order mark, stripped before strict decoding
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// A successfully parsed file: the syntax tree plus the normalized text the
/// tree was built from (post-decode, post-recovery).
pub struct ParsedFile {
    pub tree: Tree,
    pub text: String,
}

/// What happened to a file
pub enum ParseDisposition {
    /// A usable tree was produced (possibly after recovery)
    Parsed(ParsedFile),
    /// Pre-emptive skip: the file exceeded the size ceiling before any read
    Skipped,
    /// Recovery exhausted; the file is excluded from results
    Failed,
}

/// The parser's only output: a disposition plus every report it generated.
/// Reports travel by value so the caller can merge them single-writer.
pub struct ParseOutcome {
    pub disposition: ParseDisposition,
    pub reports: Vec<ErrorReport>,
}

impl ParseOutcome {
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        matches!(self.disposition, ParseDisposition::Parsed(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.disposition, ParseDisposition::Skipped)
    }
}

/// Parses one Python file under time/memory/size ceilings with layered
/// recovery. Never fails outward.
pub struct BoundedParser {
    limits: ParseLimits,
}

impl BoundedParser {
    #[must_use]
    pub const fn new(limits: ParseLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    /// Parse a file from disk. All failures are reported, none raised.
    pub async fn parse_file(&self, path: &Path) -> ParseOutcome {
        let mut reports = Vec::new();
        let disposition = self.parse_inner(path, &mut reports).await;
        ParseOutcome {
            disposition,
            reports,
        }
    }

    async fn parse_inner(
        &self,
        path: &Path,
        reports: &mut Vec<ErrorReport>,
    ) -> ParseDisposition {
        let display = path.display().to_string();

        // Size guard, before any read
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(err) => {
                reports.push(ErrorReport::new(
                    &display,
                    ErrorKind::Io,
                    Severity::Error,
                    format!("Failed to stat file: {err}"),
                ));
                return ParseDisposition::Failed;
            }
        };
        if meta.len() > self.limits.max_file_size_bytes {
            reports.push(ErrorReport::new(
                &display,
                ErrorKind::FileTooLarge,
                Severity::Warning,
                format!(
                    "File too large ({} bytes > {} bytes)",
                    meta.len(),
                    self.limits.max_file_size_bytes
                ),
            ));
            return ParseDisposition::Skipped;
        }

        // Memory guard: on breach, record a critical report and fall through
        // to the truncation rung rather than reading the whole file into the
        // analysis pipeline.
        let mut truncate_for_memory = false;
        if let MemoryStatus::Exceeded {
            used_bytes,
            effective_limit_bytes,
        } = check_memory(self.limits.max_memory_bytes)
        {
            reports.push(ErrorReport::new(
                &display,
                ErrorKind::MemoryLimit,
                Severity::Critical,
                format!(
                    "Memory usage ({used_bytes} bytes) exceeds effective limit ({effective_limit_bytes} bytes)"
                ),
            ));
            truncate_for_memory = true;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                reports.push(ErrorReport::new(
                    &display,
                    ErrorKind::Io,
                    Severity::Error,
                    format!("Failed to read file: {err}"),
                ));
                return ParseDisposition::Failed;
            }
        };

        // Decode ladder: strict UTF-8 -> BOM-stripped UTF-8 -> lossy
        let (text, lossy) = decode_text(&bytes);
        if lossy {
            reports.push(ErrorReport::new(
                &display,
                ErrorKind::Encoding,
                Severity::Warning,
                "File decoded with replacement characters",
            ));
        }

        let text = if truncate_for_memory {
            recovery::truncate_lines(&text, MEMORY_RECOVERY_LINE_CAP)
        } else {
            text
        };

        // Parse on an isolated blocking worker under the wall-clock ceiling
        let (tree, text) = match self.parse_with_timeout(text).await {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                reports.push(ErrorReport::new(
                    &display,
                    ErrorKind::Timeout,
                    Severity::Error,
                    format!(
                        "Parse timed out after {:?}; worker abandoned",
                        self.limits.timeout
                    ),
                ));
                return ParseDisposition::Failed;
            }
            Err(err) => {
                reports.push(ErrorReport::new(
                    &display,
                    ErrorKind::Internal,
                    Severity::Error,
                    err.to_string(),
                ));
                return ParseDisposition::Failed;
            }
        };

        // Syntax rung: a tree with error nodes gets one line-repair retry
        if tree.root_node().has_error() {
            let location = first_error_location(&tree, &text);
            let (repaired, replaced) = recovery::repair_lines(&text);

            match self.parse_with_timeout(repaired).await {
                Ok(Some((repaired_tree, repaired_text)))
                    if !repaired_tree.root_node().has_error() =>
                {
                    let mut report = ErrorReport::new(
                        &display,
                        ErrorKind::Syntax,
                        Severity::Warning,
                        format!("Recovered by replacing {replaced} invalid line(s)"),
                    );
                    if let Some((line, column, snippet)) = location {
                        report = report.at(line, column).snippet(snippet);
                    }
                    reports.push(report);
                    return ParseDisposition::Parsed(ParsedFile {
                        tree: repaired_tree,
                        text: repaired_text,
                    });
                }
                _ => {
                    let mut report = ErrorReport::new(
                        &display,
                        ErrorKind::Syntax,
                        Severity::Error,
                        "Syntax errors persisted after line repair",
                    );
                    if let Some((line, column, snippet)) = location {
                        report = report.at(line, column).snippet(snippet);
                    }
                    reports.push(report);
                    return ParseDisposition::Failed;
                }
            }
        }

        ParseDisposition::Parsed(ParsedFile { tree, text })
    }

    /// Run one parse on a blocking worker with a hard deadline. `Ok(None)`
    /// means timeout: the worker is abandoned, not cancelled — the thread
    /// runs to completion in the background, bounded by process lifetime.
    async fn parse_with_timeout(&self, text: String) -> Result<Option<(Tree, String)>> {
        let handle = tokio::task::spawn_blocking(move || {
            parse_python(&text).map(|tree| (tree, text))
        });

        match tokio::time::timeout(self.limits.timeout, handle).await {
            Ok(Ok(result)) => result.map(Some),
            Ok(Err(join_err)) => Err(ParserError::WorkerError(join_err.to_string())),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// One-shot unbounded parse of an in-memory snippet. Used for scoring
/// already-extracted units, where the file-level ceilings have applied.
#[must_use]
pub fn parse_source(text: &str) -> Option<Tree> {
    parse_python(text).ok()
}

/// One-shot Python parse with a fresh parser instance.
pub(crate) fn parse_python(text: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParserError::TreeSitterError(format!("Failed to set language: {e}")))?;
    parser
        .parse(text, None)
        .ok_or_else(|| ParserError::TreeSitterError("Parser produced no tree".to_string()))
}

fn decode_text(bytes: &[u8]) -> (String, bool) {
    let stripped = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(stripped) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (String::from_utf8_lossy(stripped).into_owned(), true),
    }
}

/// Locate the first error node for report context: 1-based line, column,
/// and the offending source line.
fn first_error_location(tree: &Tree, text: &str) -> Option<(usize, usize, String)> {
    fn find_error(node: Node) -> Option<Node> {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            if let Some(found) = find_error(child) {
                return Some(found);
            }
        }
        None
    }

    let error_node = find_error(tree.root_node())?;
    let row = error_node.start_position().row;
    let column = error_node.start_position().column;
    let snippet = text.lines().nth(row).unwrap_or("").to_string();
    Some((row + 1, column, snippet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn parser_with(limits: ParseLimits) -> BoundedParser {
        BoundedParser::new(limits)
    }

    async fn write_and_parse(content: &[u8], limits: ParseLimits) -> ParseOutcome {
        let temp = tempdir().unwrap();
        let path = temp.path().join("input.py");
        std::fs::write(&path, content).unwrap();
        parser_with(limits).parse_file(&path).await
    }

    #[tokio::test]
    async fn valid_file_parses_cleanly() {
        let outcome =
            write_and_parse(b"def add(a, b):\n    return a + b\n", ParseLimits::default()).await;

        assert!(outcome.is_parsed());
        assert!(outcome.reports.is_empty());
        if let ParseDisposition::Parsed(parsed) = outcome.disposition {
            assert!(!parsed.tree.root_node().has_error());
            assert!(parsed.text.contains("def add"));
        }
    }

    #[tokio::test]
    async fn oversized_file_is_skipped_with_warning() {
        let limits = ParseLimits {
            max_file_size_bytes: 4,
            ..Default::default()
        };
        let outcome = write_and_parse(b"x = 1\ny = 2\n", limits).await;

        assert!(outcome.is_skipped());
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].kind, ErrorKind::FileTooLarge);
        assert_eq!(outcome.reports[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn invalid_utf8_decodes_lossily_with_warning() {
        let mut bytes = b"x = 'caf".to_vec();
        bytes.push(0xE9); // latin-1 e-acute, invalid as UTF-8
        bytes.extend_from_slice(b"'\n");

        let outcome = write_and_parse(&bytes, ParseLimits::default()).await;

        assert!(outcome.is_parsed());
        assert!(outcome
            .reports
            .iter()
            .any(|r| r.kind == ErrorKind::Encoding && r.severity == Severity::Warning));
    }

    #[tokio::test]
    async fn bom_is_stripped_without_warning() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"x = 1\n");

        let outcome = write_and_parse(&bytes, ParseLimits::default()).await;

        assert!(outcome.is_parsed());
        assert!(outcome.reports.is_empty());
        if let ParseDisposition::Parsed(parsed) = outcome.disposition {
            assert!(parsed.text.starts_with("x = 1"));
        }
    }

    #[tokio::test]
    async fn broken_line_is_repaired_with_warning() {
        let outcome =
            write_and_parse(b"x = 1\ndef broken(:\ny = 2\n", ParseLimits::default()).await;

        assert!(outcome.is_parsed());
        let syntax_reports: Vec<_> = outcome
            .reports
            .iter()
            .filter(|r| r.kind == ErrorKind::Syntax)
            .collect();
        assert_eq!(syntax_reports.len(), 1);
        assert_eq!(syntax_reports[0].severity, Severity::Warning);

        if let ParseDisposition::Parsed(parsed) = outcome.disposition {
            assert!(parsed.text.contains("x = 1"));
            assert!(!parsed.text.contains("def broken(:"));
        }
    }

    #[tokio::test]
    async fn missing_file_fails_with_io_report() {
        let parser = parser_with(ParseLimits::default());
        let outcome = parser.parse_file(Path::new("/nonexistent/void.py")).await;

        assert!(!outcome.is_parsed());
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.reports[0].kind, ErrorKind::Io);
    }

    #[tokio::test]
    async fn zero_timeout_reports_timeout() {
        let limits = ParseLimits {
            timeout: Duration::from_nanos(1),
            ..Default::default()
        };
        // Enough text that the worker cannot finish before the deadline fires
        let big = "x = 1\n".repeat(200_000);
        let outcome = write_and_parse(big.as_bytes(), limits).await;

        assert!(!outcome.is_parsed());
        assert!(outcome
            .reports
            .iter()
            .any(|r| r.kind == ErrorKind::Timeout));
    }

    #[test]
    fn error_location_points_at_broken_line() {
        let text = "x = 1\ndef broken(:\n";
        let tree = parse_python(text).unwrap();
        assert!(tree.root_node().has_error());

        let (line, _col, snippet) = first_error_location(&tree, text).unwrap();
        assert_eq!(line, 2);
        assert!(snippet.contains("broken"));
    }
}
