//! Directory traversal driven by the inclusion policy.
//!
//! Uses the `ignore` crate's walker with its built-in filters switched
//! off: hidden entries and ignore files are handled by the
//! [`InclusionPolicy`], which also prunes excluded directories before
//! they are read.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::InclusionPolicy;
use crate::tree::{extension_of, FileNode, TreeBuilder};

/// Errors that can occur before a walk starts.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

/// A file that passed the inclusion policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// `/`-separated path relative to the root.
    pub relative: String,
    /// Size in bytes at walk time.
    pub size: u64,
}

fn check_root(root: &Path) -> Result<(), WalkError> {
    if !root.exists() {
        return Err(WalkError::NotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(WalkError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Walk `dir` and return every included file below it.
///
/// Directories rejected by [`InclusionPolicy::should_descend`] are never
/// read. Unreadable directories and entries are logged and skipped.
/// Results are sorted by relative path.
fn walk_dir(policy: &Arc<InclusionPolicy>, dir: &Path) -> Vec<Candidate> {
    let filter_policy = Arc::clone(policy);
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !is_dir || filter_policy.should_descend(entry.path())
        })
        .build();

    let mut candidates = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if !policy.should_include(path) {
            tracing::trace!(path = %path.display(), "excluded");
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot stat file");
                continue;
            }
        };

        candidates.push(Candidate {
            path: path.to_path_buf(),
            relative: policy.relative(path),
            size,
        });
    }

    candidates.sort_by(|a, b| a.relative.cmp(&b.relative));
    candidates
}

/// Enumerate every included file under the policy's root.
pub fn collect_candidates(policy: &Arc<InclusionPolicy>) -> Result<Vec<Candidate>, WalkError> {
    check_root(policy.root())?;
    let candidates = walk_dir(policy, policy.root());
    tracing::debug!(count = candidates.len(), "collected candidates");
    Ok(candidates)
}

/// Resolve an explicit selection into candidates.
///
/// Files are checked against the policy directly; directories are walked
/// with the usual pruning. Paths outside the root, missing paths, and
/// repeated paths are dropped. Selection order is kept.
pub fn expand_selection(
    policy: &Arc<InclusionPolicy>,
    selection: &[PathBuf],
) -> Result<Vec<Candidate>, WalkError> {
    check_root(policy.root())?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for selected in selection {
        let path = if selected.is_absolute() {
            selected.clone()
        } else {
            policy.root().join(selected)
        };

        if !path.starts_with(policy.root()) {
            tracing::warn!(path = %path.display(), "selection outside project root");
            continue;
        }

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "selected path unavailable");
                continue;
            }
        };

        let found = if metadata.is_dir() {
            if !policy.should_descend(&path) {
                continue;
            }
            walk_dir(policy, &path)
        } else if policy.should_include(&path) {
            vec![Candidate {
                relative: policy.relative(&path),
                path,
                size: metadata.len(),
            }]
        } else {
            Vec::new()
        };

        for candidate in found {
            if seen.insert(candidate.path.clone()) {
                candidates.push(candidate);
            }
        }
    }

    Ok(candidates)
}

/// Name shown for the root node.
pub fn root_name(root: &Path) -> String {
    root.file_name().map_or_else(
        || root.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Assemble a tree from already-resolved candidates.
pub fn tree_from_candidates(root: &Path, candidates: &[Candidate]) -> FileNode {
    let mut builder = TreeBuilder::new(root_name(root));
    for candidate in candidates {
        builder.insert_file(&candidate.relative, candidate.size);
    }
    builder.build()
}

/// Build the project structure.
///
/// With `selection`, only the selected paths (and included files inside
/// selected directories) appear; otherwise the whole root is walked.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cartographer::config::Config;
/// use cartographer::policy::InclusionPolicy;
/// use cartographer::walker::build_structure;
///
/// let policy = Arc::new(InclusionPolicy::new("/path/to/project", Config::default()).unwrap());
/// let tree = build_structure(&policy, None).unwrap();
/// println!("{} files", tree.file_count());
/// ```
pub fn build_structure(
    policy: &Arc<InclusionPolicy>,
    selection: Option<&[PathBuf]>,
) -> Result<FileNode, WalkError> {
    let candidates = match selection {
        Some(paths) => expand_selection(policy, paths)?,
        None => collect_candidates(policy)?,
    };
    Ok(tree_from_candidates(policy.root(), &candidates))
}

/// Content-free summary of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnalysis {
    pub total_files: usize,
    /// Extension (`.ts`, or `(none)`) to file count.
    pub file_types_histogram: BTreeMap<String, usize>,
    /// First path segment (`(root)` for top-level files) to file count.
    pub top_level_directory_histogram: BTreeMap<String, usize>,
}

/// Histogram key for files without an extension.
pub const NO_EXTENSION: &str = "(none)";
/// Histogram key for files directly in the root.
pub const ROOT_BUCKET: &str = "(root)";

/// Count included files by extension and top-level directory.
pub fn quick_analysis(policy: &Arc<InclusionPolicy>) -> Result<QuickAnalysis, WalkError> {
    let candidates = collect_candidates(policy)?;
    let mut analysis = QuickAnalysis {
        total_files: candidates.len(),
        ..Default::default()
    };

    for candidate in &candidates {
        let extension = extension_of(Path::new(&candidate.relative))
            .unwrap_or_else(|| NO_EXTENSION.to_string());
        *analysis.file_types_histogram.entry(extension).or_default() += 1;

        let bucket = match candidate.relative.split_once('/') {
            Some((top, _)) => top.to_string(),
            None => ROOT_BUCKET.to_string(),
        };
        *analysis.top_level_directory_histogram.entry(bucket).or_default() += 1;
    }

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn policy_for(root: &Path, config: Config) -> Arc<InclusionPolicy> {
        Arc::new(InclusionPolicy::new(root, config).unwrap())
    }

    fn relatives(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.relative.as_str()).collect()
    }

    #[test]
    fn test_collect_respects_gitignore_and_hidden_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", b"export {}");
        write(dir.path(), "dist/bundle.js", b"x\0y");
        write(dir.path(), ".gitignore", b"dist/\n");
        write(dir.path(), ".env.example", b"KEY=");

        let policy = policy_for(dir.path(), Config::default());
        let candidates = collect_candidates(&policy).unwrap();

        assert_eq!(relatives(&candidates), vec![".env.example", ".gitignore", "src/a.ts"]);
        assert_eq!(candidates[2].size, 9);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", b"");
        write(dir.path(), "web/node_modules/pkg/index.js", b"");
        write(dir.path(), "web/app.js", b"");

        let policy = policy_for(dir.path(), Config::default());
        let candidates = collect_candidates(&policy).unwrap();
        assert_eq!(relatives(&candidates), vec!["web/app.js"]);
    }

    #[test]
    fn test_missing_root() {
        let policy = policy_for(Path::new("/nonexistent/project"), Config::default());
        assert!(matches!(
            collect_candidates(&policy),
            Err(WalkError::NotFound { .. })
        ));
    }

    #[test]
    fn test_selection_dedupes_and_expands_directories() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", b"a");
        write(dir.path(), "src/b.ts", b"b");
        write(dir.path(), "docs/readme.md", b"r");

        let policy = policy_for(dir.path(), Config::default());
        let selection = vec![
            dir.path().join("docs/readme.md"),
            dir.path().join("src"),
            dir.path().join("src/a.ts"),
            PathBuf::from("docs/readme.md"),
            PathBuf::from("/elsewhere/file.txt"),
            dir.path().join("missing.txt"),
        ];
        let candidates = expand_selection(&policy, &selection).unwrap();
        assert_eq!(relatives(&candidates), vec!["docs/readme.md", "src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn test_selection_still_applies_policy() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep.rs", b"");
        write(dir.path(), "drop.log", b"");

        let config = Config {
            exclude: vec!["**/*.log".into()],
            ..Config::default()
        };
        let policy = policy_for(dir.path(), config);
        let selection = vec![dir.path().join("keep.rs"), dir.path().join("drop.log")];
        let candidates = expand_selection(&policy, &selection).unwrap();
        assert_eq!(relatives(&candidates), vec!["keep.rs"]);
    }

    #[test]
    fn test_build_structure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib/util.rs", b"12345");
        write(dir.path(), "Cargo.toml", b"[package]");

        let policy = policy_for(dir.path(), Config::default());
        let tree = build_structure(&policy, None).unwrap();

        assert!(tree.is_directory());
        assert_eq!(tree.file_count(), 2);
        assert_eq!(tree.children()[0].name, "src");
        assert_eq!(tree.find("src/lib/util.rs").unwrap().size(), Some(5));
    }

    #[test]
    fn test_quick_analysis() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", b"");
        write(dir.path(), "src/b.ts", b"");
        write(dir.path(), "lib/c.ts", b"");
        write(dir.path(), "README.md", b"");
        write(dir.path(), "docs/guide.md", b"");

        let policy = policy_for(dir.path(), Config::default());
        let analysis = quick_analysis(&policy).unwrap();

        assert_eq!(analysis.total_files, 5);
        assert_eq!(analysis.file_types_histogram.get(".ts"), Some(&3));
        assert_eq!(analysis.file_types_histogram.get(".md"), Some(&2));
        assert_eq!(analysis.top_level_directory_histogram.get("src"), Some(&2));
        assert_eq!(analysis.top_level_directory_histogram.get(ROOT_BUCKET), Some(&1));
    }
}
