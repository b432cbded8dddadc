//! The output payload and its three encodings.
//!
//! A run produces one [`OutputPayload`]. It serializes losslessly to JSON,
//! to a sectioned plain-text report suitable for pasting into an LLM
//! prompt, or to CSV tables.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{TextContent, TextEncoding};
use crate::config::{DocumentationType, OutputFormat};
use crate::stats::RunStatistics;
use crate::tokens::{count_lines, estimate_tokens};
use crate::tree::{
    extension_of, file_type_label, format_number, format_size, render_tree, FileNode,
    RenderOptions,
};

/// Errors that can occur while serializing or writing output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot write {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One documented file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// `/`-separated path relative to the root.
    pub path: String,
    pub content: String,
    /// Size on disk in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub tokens: usize,
    pub lines: usize,
    pub encoding: TextEncoding,
}

impl FileRecord {
    /// Build a record for UTF-8 content.
    pub fn new(path: impl Into<String>, content: String, size: u64) -> Self {
        Self::with_encoding(path, content, size, TextEncoding::Utf8)
    }

    fn with_encoding(
        path: impl Into<String>,
        content: String,
        size: u64,
        encoding: TextEncoding,
    ) -> Self {
        let path = path.into();
        Self {
            extension: extension_of(Path::new(&path)),
            tokens: estimate_tokens(&content),
            lines: count_lines(&content),
            path,
            content,
            size,
            encoding,
        }
    }

    /// Build a record from classified content.
    pub fn from_text(path: impl Into<String>, text: TextContent) -> Self {
        Self::with_encoding(path, text.text, text.size, text.encoding)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Project-level summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub root: String,
    pub generated_at: DateTime<Utc>,
    pub documentation_type: DocumentationType,
    pub total_files: usize,
    pub documented_files: usize,
    pub total_size: u64,
    pub documented_size: u64,
    pub duration_ms: u64,
    pub token_estimate: usize,
}

impl ProjectMetadata {
    /// Derive the metadata block from frozen statistics.
    pub fn from_statistics(
        root: impl Into<String>,
        documentation_type: DocumentationType,
        stats: &RunStatistics,
    ) -> Self {
        Self {
            root: root.into(),
            generated_at: stats.finished_at,
            documentation_type,
            total_files: stats.total_files,
            documented_files: stats.documented_files,
            total_size: stats.total_size,
            documented_size: stats.documented_size,
            duration_ms: stats.duration_ms,
            token_estimate: stats.token_estimate,
        }
    }
}

/// The final snapshot of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPayload {
    pub metadata: ProjectMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<FileNode>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    pub statistics: RunStatistics,
}

impl OutputPayload {
    /// Paths of the documented files.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Find a record by relative path.
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Serialize a payload in the requested format.
pub fn format_output(payload: &OutputPayload, format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => format_json(payload),
        OutputFormat::Text => Ok(format_text(payload)),
        OutputFormat::Csv => format_csv(payload),
    }
}

/// Serialize and write a payload, creating parent directories as needed.
pub fn write_output(
    payload: &OutputPayload,
    path: &Path,
    format: OutputFormat,
) -> Result<(), OutputError> {
    let rendered = format_output(payload, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, rendered).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), %format, "wrote output");
    Ok(())
}

// ============================================================================
// JSON Formatting
// ============================================================================

/// Pretty-printed JSON; parses back with [`parse_json`].
pub fn format_json(payload: &OutputPayload) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(payload)?)
}

pub fn parse_json(json: &str) -> Result<OutputPayload, OutputError> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Text Formatting
// ============================================================================

/// Plain-text report: header, file map, file contents, statistics.
pub fn format_text(payload: &OutputPayload) -> String {
    // Pre-allocate for typical output size
    let capacity = 8192 + payload.files.iter().map(|f| f.content.len() + 128).sum::<usize>();
    let mut output = String::with_capacity(capacity);
    let meta = &payload.metadata;

    output.push_str("<project>\n");
    output.push_str(&format!("Root: {}\n", meta.root));
    output.push_str(&format!("Generated: {}\n", meta.generated_at.to_rfc3339()));
    output.push_str(&format!("Type: {}\n", meta.documentation_type));
    output.push_str(&format!(
        "Files: {} documented of {} included\n",
        format_number(meta.documented_files),
        format_number(meta.total_files)
    ));
    output.push_str("</project>\n\n");

    if let Some(tree) = &payload.structure {
        output.push_str("<file_map>\n");
        output.push_str(&render_tree(tree, &RenderOptions::with_metadata()));
        output.push_str("</file_map>\n\n");
    }

    if meta.documentation_type.wants_content() {
        output.push_str("<files>\n");
        for file in &payload.files {
            output.push_str(&format!(
                "--- {} ({}, {} lines, {} tokens) ---\n",
                file.path,
                format_size(file.size),
                format_number(file.lines),
                format_number(file.tokens)
            ));
            output.push_str(&file.content);
            if !file.content.ends_with('\n') {
                output.push('\n');
            }
            output.push('\n');
        }
        output.push_str("</files>\n\n");
    }

    output.push_str("<statistics>\n");
    output.push_str(&format_statistics_text(&payload.statistics));
    output.push_str("</statistics>\n");

    output
}

fn format_statistics_text(stats: &RunStatistics) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Files: {} documented, {} skipped, {} total\n",
        format_number(stats.documented_files),
        format_number(stats.skipped_files),
        format_number(stats.total_files)
    ));
    output.push_str(&format!(
        "Size: {} documented of {} total\n",
        format_size(stats.documented_size),
        format_size(stats.total_size)
    ));
    output.push_str(&format!(
        "Average documented file: {}\n",
        format_size(stats.average_file_size)
    ));
    if let Some(largest) = &stats.largest_file {
        output.push_str(&format!(
            "Largest file: {} ({})\n",
            largest.path,
            format_size(largest.size)
        ));
    }
    output.push_str(&format!(
        "Estimated tokens: {}\n",
        format_number(stats.token_estimate)
    ));
    output.push_str(&format!("Duration: {}ms\n", stats.duration_ms));

    if !stats.extension_histogram.is_empty() {
        output.push_str("\nExtensions:\n");
        for (extension, count) in &stats.extension_histogram {
            output.push_str(&format!("- {}: {}\n", extension, format_number(*count)));
        }
    }

    output
}

// ============================================================================
// CSV Formatting
// ============================================================================

fn csv_block<I, R>(header: [&str; 2], rows: I) -> Result<String, OutputError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    into_string(writer)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, OutputError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| OutputError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// CSV tables separated by blank lines: metadata key/value pairs, one row
/// per tree node (or per file record when no structure was requested),
/// and a file-type histogram.
pub fn format_csv(payload: &OutputPayload) -> Result<String, OutputError> {
    let meta = &payload.metadata;

    let metadata_rows: Vec<[String; 2]> = vec![
        ["root".into(), meta.root.clone()],
        ["generatedAt".into(), meta.generated_at.to_rfc3339()],
        ["documentationType".into(), meta.documentation_type.to_string()],
        ["totalFiles".into(), meta.total_files.to_string()],
        ["documentedFiles".into(), meta.documented_files.to_string()],
        ["totalSize".into(), meta.total_size.to_string()],
        ["documentedSize".into(), meta.documented_size.to_string()],
        ["durationMs".into(), meta.duration_ms.to_string()],
        ["tokenEstimate".into(), meta.token_estimate.to_string()],
    ];
    let metadata = csv_block(["key", "value"], metadata_rows)?;

    let mut table = csv::WriterBuilder::new().from_writer(Vec::new());
    table.write_record(["type", "name", "path", "size", "extension"])?;
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();

    match &payload.structure {
        Some(tree) => {
            for node in tree.iter() {
                let size = node.size().map(|s| s.to_string()).unwrap_or_default();
                table.write_record([
                    node.kind.label(),
                    node.name.as_str(),
                    node.path.as_str(),
                    size.as_str(),
                    node.extension().unwrap_or_default(),
                ])?;
                if let Some(file_type) = node.file_type() {
                    *histogram.entry(file_type.to_string()).or_default() += 1;
                }
            }
        }
        None => {
            for file in &payload.files {
                let size = file.size.to_string();
                table.write_record([
                    "file",
                    file.file_name(),
                    file.path.as_str(),
                    size.as_str(),
                    file.extension.as_deref().unwrap_or_default(),
                ])?;
                let file_type = file_type_label(file.extension.as_deref());
                *histogram.entry(file_type.to_string()).or_default() += 1;
            }
        }
    }
    let nodes = into_string(table)?;

    let histogram_rows: Vec<[String; 2]> = histogram
        .into_iter()
        .map(|(file_type, count)| [file_type, count.to_string()])
        .collect();
    let histogram = csv_block(["fileType", "count"], histogram_rows)?;

    Ok(format!("{metadata}\n{nodes}\n{histogram}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsAccumulator;
    use crate::tree::TreeBuilder;

    fn payload(kind: DocumentationType, files: Vec<FileRecord>, with_tree: bool) -> OutputPayload {
        let mut acc = StatsAccumulator::new();
        for file in &files {
            acc.record(file);
        }
        let structure = with_tree.then(|| {
            let mut builder = TreeBuilder::new("project");
            for file in &files {
                builder.insert_file(&file.path, file.size);
            }
            builder.build()
        });
        let now = Utc::now();
        let total = files.len();
        let size = files.iter().map(|f| f.size).sum();
        let statistics = acc.finalize(total, size, now, now);
        OutputPayload {
            metadata: ProjectMetadata::from_statistics("/work/project", kind, &statistics),
            structure,
            files,
            statistics,
        }
    }

    fn sample() -> OutputPayload {
        payload(
            DocumentationType::Both,
            vec![
                FileRecord::new("src/a.ts", "export const a = 1;\n".into(), 20),
                FileRecord::new("README.md", "# Title".into(), 7),
            ],
            true,
        )
    }

    #[test]
    fn test_file_record_metrics() {
        let record = FileRecord::new("src/x.ts", "a".repeat(400), 400);
        assert_eq!(record.tokens, 100);
        assert_eq!(record.lines, 1);
        assert_eq!(record.extension.as_deref(), Some(".ts"));
        assert_eq!(record.file_name(), "x.ts");
    }

    #[test]
    fn test_json_round_trip() {
        let original = sample();
        let json = format_json(&original).unwrap();
        let parsed = parse_json(&json).unwrap();

        assert_eq!(parsed.metadata, original.metadata);
        assert_eq!(parsed.files, original.files);
        assert_eq!(parsed.structure, original.structure);
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_json_keys() {
        let value: serde_json::Value =
            serde_json::from_str(&format_json(&sample()).unwrap()).unwrap();
        assert_eq!(value["metadata"]["documentationType"], "both");
        assert_eq!(value["metadata"]["documentedFiles"], 2);
        assert_eq!(value["statistics"]["tokenEstimate"], 7);
        assert_eq!(value["files"][0]["encoding"], "utf-8");
        assert_eq!(value["structure"]["type"], "directory");
    }

    #[test]
    fn test_text_sections() {
        let text = format_text(&sample());

        assert!(text.starts_with("<project>\nRoot: /work/project\n"));
        assert!(text.contains("<file_map>\nproject/\n├── src/\n│   └── a.ts [TypeScript, 20B]\n└── README.md"));
        assert!(text.contains("--- src/a.ts (20B, 1 lines, 5 tokens) ---\nexport const a = 1;\n\n"));
        assert!(text.contains("--- README.md (7B, 1 lines, 2 tokens) ---\n# Title\n\n"));
        assert!(text.contains("Largest file: src/a.ts (20B)"));
        assert!(text.ends_with("</statistics>\n"));
    }

    #[test]
    fn test_text_structure_only_has_no_files_section() {
        let text = format_text(&payload(DocumentationType::Structure, vec![], true));
        assert!(text.contains("<file_map>"));
        assert!(!text.contains("<files>"));
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let files = vec![FileRecord::new("a,b\".ts", "x".into(), 1)];
        let csv = format_csv(&payload(DocumentationType::Documentation, files, false)).unwrap();
        assert!(csv.contains("file,\"a,b\"\".ts\",\"a,b\"\".ts\",1,.ts\n"));
    }

    #[test]
    fn test_csv_blocks() {
        let csv = format_csv(&sample()).unwrap();
        let blocks: Vec<&str> = csv.split("\n\n").collect();
        assert_eq!(blocks.len(), 3);

        assert!(blocks[0].starts_with("key,value\nroot,/work/project\n"));
        assert!(blocks[0].contains("documentationType,both"));

        let rows: Vec<&str> = blocks[1].lines().collect();
        assert_eq!(rows[0], "type,name,path,size,extension");
        assert_eq!(rows[1], "directory,project,.,,");
        assert_eq!(rows[2], "directory,src,src,,");
        assert_eq!(rows[3], "file,a.ts,src/a.ts,20,.ts");
        assert_eq!(rows[4], "file,README.md,README.md,7,.md");

        assert!(blocks[2].starts_with("fileType,count\n"));
        assert!(blocks[2].contains("Documentation,1"));
        assert!(blocks[2].contains("TypeScript,1"));
    }

    #[test]
    fn test_write_output_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/out/snapshot.txt");
        write_output(&sample(), &path, OutputFormat::Text).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<statistics>"));
    }

    #[test]
    fn test_write_output_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = write_output(&sample(), &blocker.join("out.json"), OutputFormat::Json).unwrap_err();
        assert!(matches!(err, OutputError::Io { .. }));
    }
}
