//! Inclusion policy: the compiled form of a [`Config`].
//!
//! Decision order for a file is fixed. Exclusion (exclude patterns and
//! ignore-file rules) is checked first and always wins. Otherwise the
//! include patterns admit the file, and failing that any override's own
//! include list does. Overrides can only add files, never remove them.

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError, DocumentationType, OutputFormat};
use crate::ignore_rules::IgnoreRules;
use crate::patterns::{relative_to, PatternList};

/// Child name used to ask whether a pattern covers everything below a
/// directory. No real entry can be named this.
const DESCENDANT_PROBE: &str = "\u{0}/\u{0}";

#[derive(Debug, Clone)]
struct CompiledOverride {
    name: String,
    include: PatternList,
    max_file_size: Option<u64>,
}

/// Answers inclusion and size questions for paths under one root.
#[derive(Debug, Clone)]
pub struct InclusionPolicy {
    root: PathBuf,
    config: Config,
    include: PatternList,
    exclude: PatternList,
    overrides: Vec<CompiledOverride>,
    ignore: IgnoreRules,
}

impl InclusionPolicy {
    /// Compile a policy, reading ignore files from `root`.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Result<Self, ConfigError> {
        let root = root.into();
        let ignore = IgnoreRules::for_root(&root);
        Self::with_ignore(root, config, ignore)
    }

    /// Compile a policy with explicit ignore rules.
    pub fn with_ignore(
        root: impl Into<PathBuf>,
        config: Config,
        ignore: IgnoreRules,
    ) -> Result<Self, ConfigError> {
        let include = PatternList::new(&config.include)?;
        let exclude = PatternList::new(&config.exclude)?;
        let overrides = config
            .overrides
            .iter()
            .map(|(name, rule)| {
                Ok(CompiledOverride {
                    name: name.to_string(),
                    include: PatternList::new(&rule.include)?,
                    max_file_size: rule.max_file_size,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::debug!(
            include = ?include.patterns(),
            exclude = ?exclude.patterns(),
            overrides = overrides.len(),
            ignore_rules = !ignore.is_empty(),
            "compiled inclusion policy"
        );

        Ok(Self {
            root: root.into(),
            config,
            include,
            exclude,
            overrides,
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `/`-separated path relative to the root.
    pub fn relative(&self, path: &Path) -> String {
        relative_to(&self.root, path)
    }

    fn is_excluded(&self, path: &Path, relative: &str, is_dir: bool) -> bool {
        self.exclude.is_match(relative) || self.ignore.matches(path, is_dir)
    }

    /// Whether a file belongs in the snapshot.
    ///
    /// # Examples
    ///
    /// ```
    /// use cartographer::config::Config;
    /// use cartographer::ignore_rules::IgnoreRules;
    /// use cartographer::policy::InclusionPolicy;
    /// use std::path::Path;
    ///
    /// let config = Config {
    ///     include: vec!["src/**".into()],
    ///     exclude: vec!["**/*.snap".into()],
    ///     ..Config::default()
    /// };
    /// let policy = InclusionPolicy::with_ignore("/p", config, IgnoreRules::none("/p")).unwrap();
    /// assert!(policy.should_include(Path::new("/p/src/main.rs")));
    /// assert!(!policy.should_include(Path::new("/p/src/ui.snap")));
    /// assert!(!policy.should_include(Path::new("/p/README.md")));
    /// ```
    pub fn should_include(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        if self.is_excluded(path, &relative, false) {
            return false;
        }
        if self.include.is_match(&relative) {
            return true;
        }
        self.overrides.iter().any(|o| o.include.is_match(&relative))
    }

    /// Whether the walker may descend into a directory.
    ///
    /// A directory is pruned when its own path is excluded or when an
    /// exclude pattern covers everything below it (`dir/**`).
    pub fn should_descend(&self, dir: &Path) -> bool {
        let relative = self.relative(dir);
        if relative.is_empty() {
            return true;
        }
        if self.is_excluded(dir, &relative, true) {
            return false;
        }
        if self.exclude.is_empty() {
            return true;
        }
        let probe = format!("{relative}/{DESCENDANT_PROBE}");
        !self.exclude.is_match(&probe)
    }

    /// Effective size limit for a file.
    ///
    /// The first override (in declaration order) that matches the path
    /// and sets a limit wins; otherwise the global limit applies.
    pub fn max_size_for(&self, path: &Path) -> u64 {
        let relative = self.relative(path);
        self.overrides
            .iter()
            .filter(|o| o.include.is_match(&relative))
            .find_map(|o| {
                o.max_file_size.inspect(|_| {
                    tracing::trace!(path = %relative, rule = %o.name, "override size limit");
                })
            })
            .unwrap_or(self.config.max_file_size)
    }

    pub fn skip_binary(&self) -> bool {
        self.config.skip_binary_files
    }

    pub fn skip_generated(&self) -> bool {
        self.config.skip_generated_files
    }

    /// Output file location; relative paths resolve against the root.
    pub fn output_path(&self) -> PathBuf {
        let path = &self.config.output.path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(path)
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.config.output.format
    }

    pub fn documentation_type(&self) -> DocumentationType {
        self.config.output.kind
    }
}
