//! Ignore-file rules compiled into a single path predicate.
//!
//! Rules use gitignore syntax and are interpreted relative to the directory
//! holding the ignore file. A missing or malformed ignore file is not an
//! error: the resulting predicate simply never matches.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::patterns::to_slash;

/// Ignore files read from the project root, in order.
pub const IGNORE_FILES: &[&str] = &[".gitignore", ".cartographerignore"];

/// Compiled ignore rules anchored at a base directory.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    base: PathBuf,
    matcher: Option<Gitignore>,
}

impl IgnoreRules {
    /// Rules that never match.
    pub fn none(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            matcher: None,
        }
    }

    /// Compile ignore-file text whose rules are relative to `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use cartographer::ignore_rules::IgnoreRules;
    ///
    /// let rules = IgnoreRules::compile("# build output\ndist/\n*.log\n", Path::new("/p"));
    /// assert!(rules.matches(Path::new("/p/dist/bundle.js"), false));
    /// assert!(rules.matches(Path::new("debug.log"), false));
    /// assert!(!rules.matches(Path::new("src/a.ts"), false));
    /// ```
    pub fn compile(contents: &str, base: &Path) -> Self {
        Self::compile_all(&[contents], base)
    }

    fn compile_all(sources: &[&str], base: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(base);
        let mut rule_count = 0;

        for contents in sources {
            for line in contents.lines() {
                let line = line.trim_end();
                if line.trim().is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Err(e) = builder.add_line(None, line) {
                    tracing::warn!(base = %base.display(), rule = line, error = %e, "ignore rules rejected");
                    return Self::none(base);
                }
                rule_count += 1;
            }
        }

        if rule_count == 0 {
            return Self::none(base);
        }

        match builder.build() {
            Ok(matcher) => Self {
                base: base.to_path_buf(),
                matcher: Some(matcher),
            },
            Err(e) => {
                tracing::warn!(base = %base.display(), error = %e, "failed to compile ignore rules");
                Self::none(base)
            }
        }
    }

    /// Combine every known ignore file found directly in `root`.
    pub fn for_root(root: &Path) -> Self {
        let sources: Vec<String> = IGNORE_FILES
            .iter()
            .filter_map(|name| {
                let path = root.join(name);
                match std::fs::read_to_string(&path) {
                    Ok(contents) => Some(contents),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable ignore file");
                        None
                    }
                }
            })
            .collect();
        let borrowed: Vec<&str> = sources.iter().map(String::as_str).collect();
        Self::compile_all(&borrowed, root)
    }

    /// Check whether a path is ignored.
    ///
    /// Absolute paths must lie under the base directory; anything else is
    /// treated as already relative to it. A file inside an ignored
    /// directory is ignored too.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let Some(matcher) = &self.matcher else {
            return false;
        };

        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.base) {
                Ok(rest) => rest,
                Err(_) => return false,
            }
        } else {
            path
        };

        let normalized = PathBuf::from(to_slash(relative));
        if normalized.as_os_str().is_empty() || normalized.has_root() {
            return false;
        }

        matcher
            .matched_path_or_any_parents(&normalized, is_dir)
            .is_ignore()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.as_ref().map_or(true, |m| m.is_empty())
    }
}
