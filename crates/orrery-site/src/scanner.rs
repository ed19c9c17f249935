//! Source document discovery by filesystem walking.
//!
//! The Scanner only identifies files that could become pages; it does not
//! read them. Results are sorted by relative path so that discovery order, and
//! with it every index-derived default, is stable between builds.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use orrery_config::SourceConfig;

/// A discovered source document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the source dir with `/` separators (ledger key).
    pub key: String,
    /// Page name: the file stem.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
}

/// Walks the source directory collecting [`SourceFile`]s.
pub struct Scanner {
    source_dir: PathBuf,
    max_depth: usize,
    exclude: Vec<Pattern>,
    extensions: Vec<String>,
}

impl Scanner {
    /// Create a scanner from the resolved source configuration.
    ///
    /// Invalid exclude patterns are logged and ignored.
    #[must_use]
    pub fn new(config: &SourceConfig) -> Self {
        let exclude = config
            .exclude
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %raw, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self {
            source_dir: config.dir.clone(),
            max_depth: config.max_depth,
            exclude,
            extensions: config.extensions.clone(),
        }
    }

    /// Scan the filesystem and return source documents in discovery order.
    ///
    /// Returns an empty Vec if the source directory doesn't exist. When two
    /// files share a stem, only the first in path order is kept.
    pub fn scan(&self) -> Vec<SourceFile> {
        let mut files = Vec::new();
        if self.source_dir.is_dir() {
            self.scan_directory(&self.source_dir, "", 0, &mut files);
        }
        files.sort_by(|a, b| a.key.cmp(&b.key));

        let mut seen = HashSet::new();
        files.retain(|file| {
            let unique = seen.insert(file.name.clone());
            if !unique {
                tracing::warn!(file = %file.key, name = %file.name, "duplicate page name, skipping");
            }
            unique
        });
        files
    }

    fn scan_directory(&self, dir: &Path, prefix: &str, depth: usize, files: &mut Vec<SourceFile>) {
        let Ok(entries) = fs::read_dir(dir) else {
            tracing::warn!(dir = %dir.display(), "cannot read source directory");
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Skip hidden files/dirs
            if file_name.starts_with('.') {
                continue;
            }
            let key = if prefix.is_empty() {
                file_name.clone()
            } else {
                format!("{prefix}/{file_name}")
            };
            if self.is_excluded(&key) {
                tracing::debug!(path = %key, "excluded");
                continue;
            }

            let path = entry.path();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir {
                if depth < self.max_depth {
                    self.scan_directory(&path, &key, depth + 1, files);
                }
            } else if self.has_source_extension(&path)
                && let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
            {
                files.push(SourceFile { key, name, path });
            }
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(key))
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(dir: &Path) -> SourceConfig {
        SourceConfig {
            dir: dir.to_path_buf(),
            ..SourceConfig::default()
        }
    }

    fn keys(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.key.as_str()).collect()
    }

    #[test]
    fn test_scan_sorted_and_filtered_by_extension() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("b.html"), "").unwrap();
        fs::write(temp.path().join("a.md"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        fs::write(temp.path().join("C.HTML"), "").unwrap();

        let files = Scanner::new(&config(temp.path())).scan();

        assert_eq!(keys(&files), vec!["C.HTML", "a.md", "b.html"]);
        assert_eq!(files[1].name, "a");
        assert_eq!(files[1].path, temp.path().join("a.md"));
    }

    #[test]
    fn test_scan_skips_hidden_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(".hidden.html"), "").unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/x.html"), "").unwrap();
        fs::write(temp.path().join("visible.html"), "").unwrap();

        let files = Scanner::new(&config(temp.path())).scan();

        assert_eq!(keys(&files), vec!["visible.html"]);
    }

    #[test]
    fn test_scan_respects_max_depth() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("one/two")).unwrap();
        fs::write(temp.path().join("root.html"), "").unwrap();
        fs::write(temp.path().join("one/first.html"), "").unwrap();
        fs::write(temp.path().join("one/two/second.html"), "").unwrap();

        let mut cfg = config(temp.path());
        cfg.max_depth = 1;
        let files = Scanner::new(&cfg).scan();
        assert_eq!(keys(&files), vec!["one/first.html", "root.html"]);

        cfg.max_depth = 0;
        let files = Scanner::new(&cfg).scan();
        assert_eq!(keys(&files), vec!["root.html"]);
    }

    #[test]
    fn test_scan_exclude_patterns() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("drafts")).unwrap();
        fs::write(temp.path().join("drafts/wip.html"), "").unwrap();
        fs::write(temp.path().join("keep.html"), "").unwrap();
        fs::write(temp.path().join("skip.tmp.html"), "").unwrap();

        let mut cfg = config(temp.path());
        cfg.exclude = vec!["drafts".to_owned(), "*.tmp.html".to_owned(), "[bad".to_owned()];
        let files = Scanner::new(&cfg).scan();

        assert_eq!(keys(&files), vec!["keep.html"]);
    }

    #[test]
    fn test_scan_duplicate_stem_keeps_first() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("guide.html"), "").unwrap();
        fs::write(temp.path().join("sub/guide.md"), "").unwrap();

        let files = Scanner::new(&config(temp.path())).scan();

        assert_eq!(keys(&files), vec!["guide.html"]);
    }

    #[test]
    fn test_scan_missing_dir() {
        let files = Scanner::new(&config(Path::new("/nonexistent/orrery"))).scan();
        assert!(files.is_empty());
    }
}
