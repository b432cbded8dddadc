//! Run configuration and its layered loading.
//!
//! A [`Config`] is assembled once per run from three layers, lowest
//! priority first: built-in defaults, host [`Settings`] (command-line
//! flags), and the project's `.cartographer/config.json`. Each layer only
//! overrides the keys it actually sets.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::patterns::{PatternError, PatternList};

/// Directory holding project-local cartographer files.
pub const CONFIG_DIR: &str = ".cartographer";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Errors raised while loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Which parts of the project a run documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentationType {
    /// Tree only.
    Structure,
    /// File contents only.
    Documentation,
    #[default]
    Both,
}

impl DocumentationType {
    pub fn wants_structure(self) -> bool {
        matches!(self, DocumentationType::Structure | DocumentationType::Both)
    }

    pub fn wants_content(self) -> bool {
        matches!(self, DocumentationType::Documentation | DocumentationType::Both)
    }
}

impl fmt::Display for DocumentationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentationType::Structure => write!(f, "structure"),
            DocumentationType::Documentation => write!(f, "documentation"),
            DocumentationType::Both => write!(f, "both"),
        }
    }
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless JSON serialization of the payload.
    #[default]
    #[serde(alias = "structured")]
    Json,
    /// Human-readable report.
    Text,
    /// Comma-separated tables.
    #[serde(alias = "tabular")]
    Csv,
}

impl OutputFormat {
    /// Pick a format from an output file extension.
    ///
    /// `.json` and `.csv` map to their formats; anything else is text.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => OutputFormat::Json,
            Some("csv") => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Requested output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "type")]
    pub kind: DocumentationType,
    pub format: OutputFormat,
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kind: DocumentationType::Both,
            format: OutputFormat::Json,
            path: Path::new(CONFIG_DIR).join("snapshot.json"),
        }
    }
}

/// Bespoke inclusion and size treatment for a set of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

/// Named overrides in declaration order.
///
/// Serialized as a JSON object; the order of its keys is significant
/// because the first matching override decides a file's size limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(Vec<(String, Override)>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an override, replacing the rule of an existing name in place.
    pub fn insert(&mut self, name: impl Into<String>, rule: Override) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = rule,
            None => self.0.push((name, rule)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Override)> {
        self.0.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Overrides {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, rule) in &self.0 {
            map.serialize_entry(name, rule)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Overrides {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OverridesVisitor;

        impl<'de> Visitor<'de> for OverridesVisitor {
            type Value = Overrides;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of override names to rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Overrides, A::Error> {
                let mut overrides = Overrides::new();
                while let Some((name, rule)) = access.next_entry::<String, Override>()? {
                    overrides.insert(name, rule);
                }
                Ok(overrides)
            }
        }

        deserializer.deserialize_map(OverridesVisitor)
    }
}

/// A fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub overrides: Overrides,
    pub max_file_size: u64,
    pub skip_binary_files: bool,
    pub skip_generated_files: bool,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                format!("**/{CONFIG_DIR}/**"),
                "**/.DS_Store".to_string(),
            ],
            overrides: Overrides::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            skip_binary_files: true,
            skip_generated_files: false,
            output: OutputConfig::default(),
        }
    }
}

/// Partial output descriptor used by configuration layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayer {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DocumentationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// One configuration layer. Unset keys leave lower layers untouched.
///
/// The project config file and host settings share this shape, so a
/// saved [`Config`] reads back as a layer that sets every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Overrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_binary_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_generated_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputLayer>,
}

/// Host-environment settings, populated by the command line.
pub type Settings = ConfigLayer;

impl Config {
    /// Apply a layer on top of this configuration.
    pub fn merge(mut self, layer: &ConfigLayer) -> Self {
        if let Some(include) = &layer.include {
            self.include = include.clone();
        }
        if let Some(exclude) = &layer.exclude {
            self.exclude = exclude.clone();
        }
        if let Some(overrides) = &layer.overrides {
            self.overrides = overrides.clone();
        }
        if let Some(max) = layer.max_file_size {
            self.max_file_size = max;
        }
        if let Some(skip) = layer.skip_binary_files {
            self.skip_binary_files = skip;
        }
        if let Some(skip) = layer.skip_generated_files {
            self.skip_generated_files = skip;
        }
        if let Some(output) = &layer.output {
            if let Some(kind) = output.kind {
                self.output.kind = kind;
            }
            if let Some(format) = output.format {
                self.output.format = format;
            }
            if let Some(path) = &output.path {
                self.output.path = path.clone();
            }
        }
        self
    }

    /// Compile every pattern list to surface invalid globs early.
    pub fn validate(&self) -> Result<(), ConfigError> {
        PatternList::new(&self.include)?;
        PatternList::new(&self.exclude)?;
        for (_, rule) in self.overrides.iter() {
            PatternList::new(&rule.include)?;
        }
        Ok(())
    }

    /// Resolve the configuration for a project.
    ///
    /// Merges defaults, `settings`, and the project config file. A missing,
    /// unreadable, malformed, or invalid config file is logged and ignored.
    pub fn load(root: &Path, settings: &Settings) -> Self {
        let base = Config::default().merge(settings);
        let path = config_path(root);

        let layer = match read_layer(&path) {
            Ok(Some(layer)) => layer,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no project config file");
                return base;
            }
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default configuration");
                return base;
            }
        };

        let merged = base.clone().merge(&layer);
        match merged.validate() {
            Ok(()) => {
                tracing::info!(path = %path.display(), "loaded project config");
                merged
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid project config, falling back to defaults");
                base
            }
        }
    }
}

/// Location of the project config file.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `config` as pretty JSON to the project config file.
pub fn save_config(root: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path(root);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, json + "\n").map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), "saved config");
    Ok(path)
}

/// Replace the project config file with the built-in defaults.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn regenerate_defaults(root: &Path, force: bool) -> Result<(Config, PathBuf), ConfigError> {
    let path = config_path(root);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path));
    }
    let config = Config::default();
    let path = save_config(root, &config)?;
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, json: &str) {
        fs::create_dir_all(root.join(CONFIG_DIR)).unwrap();
        fs::write(config_path(root), json).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.include, vec!["**/*"]);
        assert!(config.skip_binary_files);
        assert!(!config.skip_generated_files);
        assert_eq!(config.output.kind, DocumentationType::Both);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_wins_over_settings() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{ "maxFileSize": 10, "output": { "format": "csv" } }"#);

        let settings = Settings {
            max_file_size: Some(20),
            skip_generated_files: Some(true),
            ..Default::default()
        };
        let config = Config::load(dir.path(), &settings);

        assert_eq!(config.max_file_size, 10);
        assert!(config.skip_generated_files);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.output.kind, DocumentationType::Both);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "{ not json");

        let settings = Settings {
            max_file_size: Some(42),
            ..Default::default()
        };
        let config = Config::load(dir.path(), &settings);
        assert_eq!(config.max_file_size, 42);
        assert_eq!(config.include, vec!["**/*"]);
    }

    #[test]
    fn test_invalid_pattern_in_file_falls_back() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{ "include": ["src/[oops"] }"#);

        let config = Config::load(dir.path(), &Settings::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides_keep_declaration_order() {
        let json = r#"{
            "overrides": {
                "zeta": { "include": ["a/**"], "maxFileSize": 1 },
                "alpha": { "include": ["b/**"] }
            }
        }"#;
        let layer: ConfigLayer = serde_json::from_str(json).unwrap();
        let overrides = layer.overrides.unwrap();
        let names: Vec<&str> = overrides.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let out = serde_json::to_string(&overrides).unwrap();
        assert!(out.find("zeta").unwrap() < out.find("alpha").unwrap());
    }

    #[test]
    fn test_format_aliases() {
        let layer: OutputLayer =
            serde_json::from_str(r#"{ "type": "structure", "format": "tabular" }"#).unwrap();
        assert_eq!(layer.kind, Some(DocumentationType::Structure));
        assert_eq!(layer.format, Some(OutputFormat::Csv));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out.JSON")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("out.md")), OutputFormat::Text);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Text);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.overrides.insert(
            "docs",
            Override {
                include: vec!["docs/**".into()],
                max_file_size: Some(4096),
            },
        );
        config.skip_generated_files = true;

        save_config(dir.path(), &config).unwrap();
        let reloaded = Config::load(dir.path(), &Settings::default());
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_regenerate_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{ "maxFileSize": 7 }"#);

        let err = regenerate_defaults(dir.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));

        let (config, _) = regenerate_defaults(dir.path(), true).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(Config::load(dir.path(), &Settings::default()), Config::default());
    }
}
