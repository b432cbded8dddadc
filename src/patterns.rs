//! Glob pattern lists for include, exclude, and override matching.
//!
//! Patterns follow the usual glob conventions: `**` crosses directory
//! separators, `*` and `?` stay inside one path segment, and matching is
//! case-sensitive. Hidden entries are not special, so `**/*` matches
//! `.gitignore` as well as `src/main.rs`.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;

/// A glob pattern that failed to compile.
#[derive(Debug, Error)]
#[error("invalid glob pattern `{pattern}`: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// A compiled, ordered list of glob patterns.
#[derive(Debug, Clone)]
pub struct PatternList {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PatternList {
    /// Compile a list of patterns into a single matcher.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| PatternError {
                    pattern: pattern.to_string(),
                    source,
                })?;
            builder.add(glob);
        }

        let set = builder.build().map_err(|source| PatternError {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set,
        })
    }

    /// A list that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Check a `/`-separated path relative to the project root.
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.set.is_match(relative_path)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// One-shot match of a path against uncompiled patterns.
///
/// Invalid patterns never match. Prefer [`PatternList`] when the same
/// patterns are checked against many paths.
///
/// # Examples
///
/// ```
/// use cartographer::patterns::is_match;
///
/// assert!(is_match("src/lib/util.ts", &["src/**/*.ts"]));
/// assert!(!is_match("src/lib/util.ts", &["src/*.ts"]));
/// ```
pub fn is_match<S: AsRef<str>>(relative_path: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|pattern| {
        GlobBuilder::new(pattern.as_ref())
            .literal_separator(true)
            .build()
            .map(|glob| glob.compile_matcher().is_match(relative_path))
            .unwrap_or(false)
    })
}

/// Render a path with `/` separators and no leading `./`.
pub fn to_slash(path: &Path) -> String {
    let rendered = path.to_string_lossy().replace('\\', "/");
    match rendered.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => rendered,
    }
}

/// Path of `path` relative to `root`, `/`-separated.
///
/// Paths outside the root are returned unchanged.
pub fn relative_to(root: &Path, path: &Path) -> String {
    to_slash(path.strip_prefix(root).unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_wildcard() {
        let list = PatternList::new(&["**/*"]).unwrap();
        assert!(list.is_match("a.ts"));
        assert!(list.is_match("src/deep/nested/a.ts"));
        assert!(list.is_match(".gitignore"));
        assert!(list.is_match("src/.env"));
    }

    #[test]
    fn test_single_segment_wildcard() {
        let list = PatternList::new(&["src/*.ts"]).unwrap();
        assert!(list.is_match("src/a.ts"));
        assert!(!list.is_match("src/lib/a.ts"));
        assert!(!list.is_match("a.ts"));
    }

    #[test]
    fn test_directory_contents() {
        let list = PatternList::new(&["**/node_modules/**"]).unwrap();
        assert!(list.is_match("node_modules/react/index.js"));
        assert!(list.is_match("web/node_modules/react/index.js"));
        assert!(!list.is_match("src/modules/index.js"));
    }

    #[test]
    fn test_case_sensitive() {
        let list = PatternList::new(&["**/*.md"]).unwrap();
        assert!(list.is_match("README.md"));
        assert!(!list.is_match("README.MD"));
    }

    #[test]
    fn test_literal_segments() {
        let list = PatternList::new(&["docs/guide.md"]).unwrap();
        assert!(list.is_match("docs/guide.md"));
        assert!(!list.is_match("docs/guide.mdx"));
        assert!(!list.is_match("other/docs/guide.md"));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let list = PatternList::empty();
        assert!(list.is_empty());
        assert!(!list.is_match("anything"));

        let list = PatternList::new::<&str>(&[]).unwrap();
        assert!(!list.is_match("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternList::new(&["src/[unclosed"]).unwrap_err();
        assert_eq!(err.pattern, "src/[unclosed");
    }

    #[test]
    fn test_one_shot_match_skips_invalid() {
        assert!(is_match("a.rs", &["[bad", "*.rs"]));
        assert!(!is_match("a.rs", &["[bad"]));
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/project");
        assert_eq!(relative_to(root, Path::new("/project/src/a.ts")), "src/a.ts");
        assert_eq!(to_slash(Path::new("./src/a.ts")), "src/a.ts");
    }
}
