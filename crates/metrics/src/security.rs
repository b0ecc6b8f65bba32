use crate::config::CustomPattern;
use crate::types::{FindingSeverity, SecurityFinding};
use regex::Regex;

/// Matched text kept per finding
const EXCERPT_CAP: usize = 100;

/// Context lines captured either side of a match
const CONTEXT_LINES: usize = 2;

struct SecurityPattern {
    regex: Regex,
    message: &'static str,
    severity: FindingSeverity,
}

struct CompiledCustom {
    regex: Regex,
    message: String,
    severity: FindingSeverity,
}

/// Regex-based scanner for dangerous constructs in raw source text.
///
/// Patterns are matched case-insensitively across the whole text; every hit
/// yields a severity, a 1-based line, a truncated excerpt, and surrounding
/// context lines.
pub struct SecurityScanner {
    builtin: Vec<SecurityPattern>,
    custom: Vec<CompiledCustom>,
}

impl SecurityScanner {
    pub fn new(custom_patterns: &[CustomPattern]) -> Self {
        let mut custom = Vec::new();
        for pattern in custom_patterns {
            match Regex::new(&format!("(?im){}", pattern.regex)) {
                Ok(regex) => custom.push(CompiledCustom {
                    regex,
                    message: pattern.message.clone(),
                    severity: pattern.severity,
                }),
                Err(err) => {
                    log::warn!("Skipping invalid custom security pattern '{}': {err}", pattern.regex);
                }
            }
        }

        Self {
            builtin: builtin_patterns(),
            custom,
        }
    }

    /// Scan text for all configured patterns.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<SecurityFinding> {
        let lines: Vec<&str> = text.lines().collect();
        let mut findings = Vec::new();

        for pattern in &self.builtin {
            self.scan_one(
                text,
                &lines,
                &pattern.regex,
                pattern.message,
                pattern.severity,
                &mut findings,
            );
        }
        for pattern in &self.custom {
            self.scan_one(
                text,
                &lines,
                &pattern.regex,
                &pattern.message,
                pattern.severity,
                &mut findings,
            );
        }

        findings
    }

    #[allow(clippy::unused_self)]
    fn scan_one(
        &self,
        text: &str,
        lines: &[&str],
        regex: &Regex,
        message: &str,
        severity: FindingSeverity,
        findings: &mut Vec<SecurityFinding>,
    ) {
        for found in regex.find_iter(text) {
            let prefix = &text[..found.start()];
            let line = prefix.matches('\n').count() + 1;
            let column = found.start() - prefix.rfind('\n').map_or(0, |p| p + 1);

            let context_start = line.saturating_sub(1 + CONTEXT_LINES);
            let context_end = (line + CONTEXT_LINES).min(lines.len());
            let context = lines[context_start..context_end].join("\n");

            let mut excerpt = found.as_str().to_string();
            if excerpt.len() > EXCERPT_CAP {
                let mut end = EXCERPT_CAP;
                while !excerpt.is_char_boundary(end) {
                    end -= 1;
                }
                excerpt.truncate(end);
            }

            findings.push(SecurityFinding {
                severity,
                message: message.to_string(),
                line,
                column,
                excerpt,
                context,
            });
        }
    }
}

impl Default for SecurityScanner {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn builtin_patterns() -> Vec<SecurityPattern> {
    let table: &[(&str, &str, FindingSeverity)] = &[
        // Dynamic code execution
        (
            r"\beval\s*\([^)]*\)",
            "Use of eval() is dangerous",
            FindingSeverity::Critical,
        ),
        (
            r"\bexec\s*\([^)]*\)",
            "Use of exec() is dangerous",
            FindingSeverity::Critical,
        ),
        (
            r"__import__\s*\([^)]*\)",
            "Dynamic imports can be risky",
            FindingSeverity::High,
        ),
        // Unsafe deserialization
        (
            r"pickle\.loads?\s*\([^)]*\)",
            "Pickle deserialization can be unsafe",
            FindingSeverity::High,
        ),
        (
            r"yaml\.load\s*\([^)]*\)",
            "Use yaml.safe_load() instead of yaml.load()",
            FindingSeverity::High,
        ),
        (
            r"marshal\.loads?\s*\([^)]*\)",
            "Marshal deserialization can be unsafe",
            FindingSeverity::High,
        ),
        // Command injection
        (
            r"subprocess\.\w+\([^)]*shell\s*=\s*True",
            "Shell injection vulnerability possible",
            FindingSeverity::Critical,
        ),
        (
            r"os\.system\s*\([^)]*\)",
            "os.system() vulnerable to injection",
            FindingSeverity::High,
        ),
        (
            r"os\.popen\s*\([^)]*\)",
            "os.popen() vulnerable to injection",
            FindingSeverity::High,
        ),
        // SQL built from strings
        (
            r#""[^"]*SELECT[^"]*%s[^"]*""#,
            "Possible SQL injection vulnerability",
            FindingSeverity::Critical,
        ),
        (
            r#"f"[^"]*SELECT[^"]*\{[^"]*\}[^"]*""#,
            "Possible SQL injection with f-strings",
            FindingSeverity::Critical,
        ),
        (
            r"\.format\([^)]*\).*SELECT",
            "Possible SQL injection with format()",
            FindingSeverity::Critical,
        ),
        // Path traversal
        (
            r"open\s*\([^)]*\.\.[^)]*\)",
            "Possible path traversal vulnerability",
            FindingSeverity::High,
        ),
        (
            r"os\.path\.join\([^)]*\.\.[^)]*\)",
            "Possible path traversal",
            FindingSeverity::High,
        ),
        // Hardcoded credentials
        (
            r#"(password|secret|token|api_key|apikey)\s*=\s*["'][^"']+["']"#,
            "Hardcoded credentials detected",
            FindingSeverity::Critical,
        ),
        (
            r#"(AWS_SECRET|AZURE_KEY|GCP_KEY)\s*=\s*["'][^"']+["']"#,
            "Cloud credentials hardcoded",
            FindingSeverity::Critical,
        ),
        // Weak randomness
        (
            r"random\.\w+\s*\([^)]*\)",
            "Use secrets module for security-sensitive randomness",
            FindingSeverity::Medium,
        ),
        // Plaintext transport
        (
            r"http://[^s]",
            "Using HTTP instead of HTTPS",
            FindingSeverity::Medium,
        ),
        // Insecure configuration
        (
            r"verify\s*=\s*False",
            "SSL verification disabled",
            FindingSeverity::High,
        ),
        (
            r"DEBUG\s*=\s*True",
            "Debug mode enabled in production",
            FindingSeverity::Medium,
        ),
    ];

    table
        .iter()
        .filter_map(|(raw, message, severity)| {
            match Regex::new(&format!("(?im){raw}")) {
                Ok(regex) => Some(SecurityPattern {
                    regex,
                    message,
                    severity: *severity,
                }),
                Err(err) => {
                    log::warn!("Built-in security pattern failed to compile: {err}");
                    None
                }
            }
        })
        .collect()
}
