//! Directory scanner
//!
//! Walks a project root, prunes excluded directories entirely, filters by
//! supported extension and size, and hashes every candidate file. Per-entry
//! I/O errors are recorded in the result and never abort the walk.

use engram_parsing::get_language_from_extension;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Skip-reason keys recorded in [`ScanResult::skipped`]
pub const SKIP_TOO_LARGE: &str = "too_large";
pub const SKIP_UNSUPPORTED: &str = "unsupported_extension";
pub const SKIP_LANGUAGE_FILTERED: &str = "language_filtered";

/// Patterns excluded from every scan: VCS, dependency, build, IDE and
/// lock-file noise
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    ".idea",
    ".vscode",
    ".vs",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "venv",
    ".venv",
    "coverage",
    ".cache",
    "*.lock",
    "*.min.js",
    "*.map",
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "go.sum",
];

/// Hidden names allowed despite the leading dot
const HIDDEN_ALLOWLIST: &[&str] = &[".github", ".gitlab"];

/// One file the scanner accepted
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub language: String,
    pub size: u64,
    pub sha256: String,
}

/// Outcome of a full directory walk
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    /// Files per language id
    pub language_counts: HashMap<String, usize>,
    /// Skip reason -> number of files skipped for it
    pub skipped: HashMap<String, usize>,
    /// Per-entry I/O failures; the walk continues past them
    pub errors: Vec<String>,
}

/// Configurable directory walker
#[derive(Debug, Clone)]
pub struct FileScanner {
    max_file_size: u64,
    exclude_patterns: Vec<String>,
    /// When set, only these language ids pass the filter
    languages: Option<Vec<String>>,
}

impl FileScanner {
    pub fn new(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            languages: None,
        }
    }

    /// Merge caller-supplied exclusion patterns (duplicates suppressed)
    pub fn with_excludes(mut self, extra: &[String]) -> Self {
        for pattern in extra {
            if !self.exclude_patterns.iter().any(|p| p == pattern) {
                self.exclude_patterns.push(pattern.clone());
            }
        }
        self
    }

    /// Restrict the scan to a set of language ids
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = Some(languages);
        self
    }

    /// Whether a path should be excluded from scanning and watching
    ///
    /// A pattern matches when the basename equals it, when the pattern is a
    /// `*suffix` glob and the basename ends with the suffix, or when any
    /// relative-path component equals it.
    pub fn should_exclude(&self, rel_path: &Path) -> bool {
        let basename = rel_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if is_hidden(&basename) && !HIDDEN_ALLOWLIST.contains(&basename.as_str()) {
            return true;
        }

        for pattern in &self.exclude_patterns {
            if let Some(suffix) = pattern.strip_prefix('*') {
                if basename.ends_with(suffix) {
                    return true;
                }
            } else if basename == *pattern {
                return true;
            } else if rel_path
                .components()
                .any(|c| c.as_os_str().to_string_lossy() == *pattern)
            {
                return true;
            }
        }
        false
    }

    /// Walk `root` and classify every entry
    pub fn scan(&self, root: &Path) -> ScanResult {
        let mut result = ScanResult::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                // Prune excluded directories wholesale: no descent
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                if rel.as_os_str().is_empty() {
                    return true;
                }
                !self.should_exclude(rel)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let abs_path = entry.path().to_path_buf();
            let rel_path = abs_path
                .strip_prefix(root)
                .unwrap_or(&abs_path)
                .to_string_lossy()
                .replace('\\', "/");

            let extension = abs_path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let Some(language) = get_language_from_extension(&extension) else {
                *result.skipped.entry(SKIP_UNSUPPORTED.to_string()).or_insert(0) += 1;
                continue;
            };
            if let Some(filter) = &self.languages {
                if !filter.iter().any(|l| l == language) {
                    *result
                        .skipped
                        .entry(SKIP_LANGUAGE_FILTERED.to_string())
                        .or_insert(0) += 1;
                    continue;
                }
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    result.errors.push(format!("{rel_path}: {e}"));
                    continue;
                }
            };
            if metadata.len() > self.max_file_size {
                *result.skipped.entry(SKIP_TOO_LARGE.to_string()).or_insert(0) += 1;
                continue;
            }

            let sha256 = match hash_file(&abs_path) {
                Ok(hash) => hash,
                Err(e) => {
                    result.errors.push(format!("{rel_path}: {e}"));
                    continue;
                }
            };

            *result
                .language_counts
                .entry(language.to_string())
                .or_insert(0) += 1;
            result.files.push(ScannedFile {
                abs_path,
                rel_path,
                language: language.to_string(),
                size: metadata.len(),
                sha256,
            });
        }

        result
    }
}

fn is_hidden(basename: &str) -> bool {
    basename.starts_with('.') && basename.len() > 1
}

/// SHA-256 of a file's contents, hex-encoded
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 of a byte slice, hex-encoded
pub fn hash_bytes(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scans_supported_files_and_counts_languages() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "src/util.rs", "pub fn util() {}");
        write(dir.path(), "scripts/run.py", "def run():\n    pass\n");
        write(dir.path(), "README.md", "# readme");

        let result = FileScanner::new(1024 * 1024).scan(dir.path());
        assert_eq!(result.files.len(), 3);
        assert_eq!(result.language_counts["rust"], 2);
        assert_eq!(result.language_counts["python"], 1);
        assert_eq!(result.skipped[SKIP_UNSUPPORTED], 1);
        assert!(result.errors.is_empty());

        let main = result
            .files
            .iter()
            .find(|f| f.rel_path == "src/main.rs")
            .unwrap();
        assert_eq!(main.sha256, hash_bytes(b"fn main() {}"));
    }

    #[test]
    fn excluded_directories_are_pruned_entirely() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/lib.rs", "fn a() {}");
        write(dir.path(), "target/debug/build.rs", "fn b() {}");
        write(dir.path(), "node_modules/pkg/index.js", "function c() {}");
        write(dir.path(), ".git/hooks/pre-commit.sh", "echo hi");

        let result = FileScanner::new(1024 * 1024).scan(dir.path());
        let paths: Vec<&str> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs"]);
    }

    #[test]
    fn hidden_names_are_skipped_except_the_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".secret/hide.rs", "fn h() {}");
        write(dir.path(), ".github/workflows/ci.yaml", "on: push");
        write(dir.path(), ".github/scripts/check.sh", "true");

        let result = FileScanner::new(1024 * 1024).scan(dir.path());
        let paths: Vec<&str> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec![".github/scripts/check.sh"]);
    }

    #[test]
    fn oversized_files_are_recorded_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.rs", &"x".repeat(2048));
        write(dir.path(), "small.rs", "fn s() {}");

        let result = FileScanner::new(1024).scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.skipped[SKIP_TOO_LARGE], 1);
    }

    #[test]
    fn language_filter_records_rejects() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        write(dir.path(), "b.py", "def b():\n    pass\n");

        let scanner =
            FileScanner::new(1024 * 1024).with_languages(vec!["rust".to_string()]);
        let result = scanner.scan(dir.path());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.skipped[SKIP_LANGUAGE_FILTERED], 1);
    }

    #[test]
    fn caller_excludes_merge_without_duplicates() {
        let scanner = FileScanner::new(1024)
            .with_excludes(&["generated".to_string(), "target".to_string()]);
        assert!(scanner.should_exclude(Path::new("generated/file.rs")));
        assert!(scanner.should_exclude(Path::new("deep/generated/file.rs")));
        assert_eq!(
            scanner
                .exclude_patterns
                .iter()
                .filter(|p| *p == "target")
                .count(),
            1
        );
    }

    #[test]
    fn suffix_patterns_match_basenames() {
        let scanner = FileScanner::new(1024);
        assert!(scanner.should_exclude(Path::new("Cargo.lock")));
        assert!(scanner.should_exclude(Path::new("app.min.js")));
        assert!(!scanner.should_exclude(Path::new("src/lib.rs")));
    }
}
