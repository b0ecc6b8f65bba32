use crate::config::AnalysisConfig;
use crate::error::{GraphError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Path fragments that mark a file as a test
const TEST_INDICATORS: &[&str] = &["test_", "_test.py", "/tests/", "/testing/"];

/// Scanner for Python source files under a project root. Enumeration order
/// is deterministic (sorted); exclusions apply to directory names at any
/// depth, glob-matched file names, symlinks (unless allowed), and test files
/// (unless included).
pub(crate) struct FileScanner {
    root: PathBuf,
    excluded_dirs: HashSet<String>,
    excluded_files: GlobSet,
    include_tests: bool,
    follow_symlinks: bool,
}

impl FileScanner {
    pub(crate) fn new(root: impl AsRef<Path>, config: &AnalysisConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.excluded_files {
            let glob = Glob::new(pattern).map_err(|e| {
                GraphError::ConfigError(format!("invalid excluded_files pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let excluded_files = builder
            .build()
            .map_err(|e| GraphError::ConfigError(e.to_string()))?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            excluded_dirs: config.excluded_dirs.iter().cloned().collect(),
            excluded_files,
            include_tests: config.include_tests,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Enumerate matching files in stable sorted order.
    pub(crate) fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let excluded_dirs = self.excluded_dirs.clone();
        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .follow_links(self.follow_symlinks);
        builder.filter_entry(move |entry| {
            !Self::in_excluded_dir(entry.path(), &root, &excluded_dirs)
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.follow_symlinks && entry.path_is_symlink() {
                        continue;
                    }
                    if path.extension().and_then(|e| e.to_str()) != Some("py") {
                        continue;
                    }
                    if let Some(name) = path.file_name() {
                        if self.excluded_files.is_match(name) {
                            continue;
                        }
                    }
                    if !self.include_tests && Self::is_test_file(path) {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read directory entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} Python files", files.len());
        files
    }

    fn in_excluded_dir(path: &Path, root: &Path, excluded: &HashSet<String>) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    if excluded.contains(&name.to_string_lossy().to_string()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_test_file(path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase().replace('\\', "/");
        TEST_INDICATORS
            .iter()
            .any(|indicator| lowered.contains(indicator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn scan_with(root: &Path, config: &AnalysisConfig) -> Vec<PathBuf> {
        FileScanner::new(root, config).unwrap().scan()
    }

    #[test]
    fn finds_python_files_in_sorted_order() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "not code").unwrap();

        let files = scan_with(temp.path(), &AnalysisConfig::default());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
    }

    #[test]
    fn excluded_dirs_match_at_any_depth() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("pkg").join("__pycache__");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("cached.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("main.py"), "x = 1\n").unwrap();

        let files = scan_with(temp.path(), &AnalysisConfig::default());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.py"));
    }

    #[test]
    fn glob_excluded_names_are_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("keep.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("skip.pyc"), "junk").unwrap();

        let config = AnalysisConfig {
            excluded_files: vec!["skip*".to_string(), "*.pyc".to_string()],
            ..Default::default()
        };
        let files = scan_with(temp.path(), &config);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.py"));
    }

    #[test]
    fn test_files_are_filtered_when_excluded() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("module.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("test_module.py"), "x = 1\n").unwrap();

        let all = scan_with(temp.path(), &AnalysisConfig::default());
        assert_eq!(all.len(), 2);

        let config = AnalysisConfig {
            include_tests: false,
            ..Default::default()
        };
        let filtered = scan_with(temp.path(), &config);
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].ends_with("module.py"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped_unless_allowed() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("real.py"), "x = 1\n").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real.py"), temp.path().join("link.py"))
            .unwrap();

        let files = scan_with(temp.path(), &AnalysisConfig::default());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("real.py"));
    }
}
