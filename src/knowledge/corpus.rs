//! Knowledge corpus discovery.
//!
//! The corpus is a flat directory of Markdown documents, re-read in full
//! on every reindex.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A source document loaded from the corpus directory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name, used as the snippet source.
    pub name: String,
    /// File stem, used in chunk ids.
    pub stem: String,
    pub text: String,
}

/// Scanner for the corpus directory.
pub struct CorpusScanner {
    root: PathBuf,
}

impl CorpusScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a path is a corpus document (`*.md`, not hidden).
    fn matches(path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);

        !hidden && path.extension().and_then(|e| e.to_str()) == Some("md")
    }

    /// Paths of every document, sorted by file name.
    pub fn scan(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            debug!("Corpus directory {} does not exist", self.root.display());
            return Vec::new();
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("Cannot read corpus entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && Self::matches(e.path()))
            .map(|e| e.into_path())
            .collect();

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        paths
    }

    /// Load every document. Invalid UTF-8 is replaced; unreadable files are skipped.
    pub fn load(&self) -> Vec<SourceDocument> {
        self.scan()
            .into_iter()
            .filter_map(|path| {
                let bytes = match fs::read(&path) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("Failed to read {}: {}", path.display(), e);
                        return None;
                    }
                };

                let name = path.file_name()?.to_string_lossy().to_string();
                let stem = path.file_stem()?.to_string_lossy().to_string();

                Some(SourceDocument {
                    name,
                    stem,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_sorted_markdown_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("power.md"), "# Power").unwrap();
        fs::write(dir.path().join("hvac.md"), "# HVAC").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        fs::write(dir.path().join(".draft.md"), "skip").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.md"), "skip").unwrap();

        let docs = CorpusScanner::new(dir.path()).load();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["hvac.md", "power.md"]);
        assert_eq!(docs[0].stem, "hvac");
        assert_eq!(docs[0].text, "# HVAC");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = CorpusScanner::new(dir.path().join("absent"));
        assert!(scanner.scan().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.md"), [b'o', b'k', 0xff]).unwrap();
        let docs = CorpusScanner::new(dir.path()).load();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.starts_with("ok"));
    }
}
