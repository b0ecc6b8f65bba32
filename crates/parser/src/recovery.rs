use crate::parser::parse_python;

/// Placeholder for lines that fail isolated re-validation. A comment is the
/// one construct that can never re-break the surrounding parse.
const LINE_PLACEHOLDER: &str = "# invalid line removed";

/// Re-validate a source text line by line, replacing lines that do not parse
/// in isolation with a neutral placeholder. Returns the reconstructed text
/// and the number of replaced lines.
///
/// Isolated validation is deliberately crude: an indented continuation line
/// can fail on its own even when valid in context. The caller only reaches
/// this path once the whole file has already failed to parse, so losing such
/// lines is the accepted cost of salvaging the rest.
pub(crate) fn repair_lines(text: &str) -> (String, usize) {
    let mut repaired = Vec::new();
    let mut replaced = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() || line_parses(line) {
            repaired.push(line.to_string());
        } else {
            repaired.push(LINE_PLACEHOLDER.to_string());
            replaced += 1;
        }
    }

    (repaired.join("\n"), replaced)
}

fn line_parses(line: &str) -> bool {
    match parse_python(line) {
        Ok(tree) => !tree.root_node().has_error(),
        Err(_) => false,
    }
}

/// Keep only the first `max_lines` lines of a text (memory recovery rung).
pub(crate) fn truncate_lines(text: &str, max_lines: usize) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i >= max_lines {
            break;
        }
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}
