//! Fluent builder API for cartographer.
//!
//! Provides both function composition and builder-style APIs for
//! documenting a project. One [`Cartographer`] run owns its tree,
//! statistics, and processed-path set; nothing is shared between runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;

use crate::classify::{classify_file, Classification, ContentRules};
use crate::config::{Config, Settings};
use crate::errors::CartographerError;
use crate::output::{write_output, FileRecord, OutputPayload, ProjectMetadata};
use crate::policy::InclusionPolicy;
use crate::progress::{CancelFlag, NoProgress, ProgressEvent, ProgressSink};
use crate::stats::StatsAccumulator;
use crate::tree::FileNode;
use crate::walker::{
    build_structure, collect_candidates, expand_selection, quick_analysis, tree_from_candidates,
    Candidate, QuickAnalysis, WalkError,
};

/// Files read concurrently per batch. Bounds open file handles.
pub const BATCH_SIZE: usize = 20;

/// Builder for documenting a project.
///
/// # Examples
///
/// ```no_run
/// use cartographer::builder::Cartographer;
/// use cartographer::config::Config;
///
/// let (payload, written) = Cartographer::new("./project", Config::default())
///     .document()
///     .unwrap();
///
/// println!("{} files -> {}", payload.files.len(), written.display());
/// ```
pub struct Cartographer {
    root: PathBuf,
    config: Config,
    selection: Option<Vec<PathBuf>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelFlag,
}

impl Cartographer {
    /// Create a new builder for the given root path.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            selection: None,
            progress: Arc::new(NoProgress),
            cancel: CancelFlag::new(),
        }
    }

    /// Document only these paths (files or directories, relative to the
    /// root or absolute).
    pub fn selection(mut self, paths: Vec<PathBuf>) -> Self {
        self.selection = Some(paths);
        self
    }

    /// Receive progress events.
    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Run without writing the output file.
    pub fn run(&self) -> Result<OutputPayload, CartographerError> {
        let root = resolve_root(&self.root)?;
        let span = tracing::info_span!("document", root = %root.display());
        let _guard = span.enter();

        let policy = Arc::new(InclusionPolicy::new(&root, self.config.clone())?);
        self.assemble(&policy)
    }

    /// Run and write the output file. Returns the payload and the path
    /// written.
    pub fn document(&self) -> Result<(OutputPayload, PathBuf), CartographerError> {
        let root = resolve_root(&self.root)?;
        let span = tracing::info_span!("document", root = %root.display());
        let _guard = span.enter();

        let policy = Arc::new(InclusionPolicy::new(&root, self.config.clone())?);
        let payload = self.assemble(&policy)?;

        let path = policy.output_path();
        self.report("Writing output", 95);
        write_output(&payload, &path, policy.output_format())?;
        self.report("Documentation complete", 100);

        Ok((payload, path))
    }

    fn report(&self, message: impl Into<String>, percent: u8) {
        self.progress.report(ProgressEvent::new(message, percent));
    }

    fn check_cancelled(&self) -> Result<(), CartographerError> {
        if self.cancel.is_cancelled() {
            tracing::info!("run cancelled");
            return Err(CartographerError::Cancelled);
        }
        Ok(())
    }

    fn assemble(&self, policy: &Arc<InclusionPolicy>) -> Result<OutputPayload, CartographerError> {
        let started_at = Utc::now();
        let kind = policy.documentation_type();
        self.report("Starting documentation", 0);

        // Structure
        let output_path = policy.output_path();
        let candidates: Vec<Candidate> = match &self.selection {
            Some(paths) => expand_selection(policy, paths)?,
            None => collect_candidates(policy)?,
        }
        .into_iter()
        .filter(|c| c.path != output_path)
        .collect();
        self.check_cancelled()?;

        let structure = kind
            .wants_structure()
            .then(|| tree_from_candidates(policy.root(), &candidates));
        tracing::info!(
            files = candidates.len(),
            directories = structure.as_ref().map_or(0, FileNode::directory_count),
            "resolved project structure"
        );
        self.report("Built project structure", 10);

        // Content
        let (files, stats) = if kind.wants_content() {
            self.document_files(policy, &candidates)?
        } else {
            (Vec::new(), StatsAccumulator::new())
        };

        // Finalize
        self.report("Finalizing statistics", 90);
        let total_size = candidates.iter().map(|c| c.size).sum();
        let statistics = stats.finalize(candidates.len(), total_size, started_at, Utc::now());
        let metadata =
            ProjectMetadata::from_statistics(policy.root().display().to_string(), kind, &statistics);
        tracing::info!(
            documented = statistics.documented_files,
            skipped = statistics.skipped_files,
            tokens = statistics.token_estimate,
            "run finished"
        );

        Ok(OutputPayload {
            metadata,
            structure,
            files,
            statistics,
        })
    }

    fn document_files(
        &self,
        policy: &InclusionPolicy,
        candidates: &[Candidate],
    ) -> Result<(Vec<FileRecord>, StatsAccumulator), CartographerError> {
        self.report("Reading file contents", 30);

        let mut processed: HashSet<&Path> = HashSet::new();
        let mut records = Vec::with_capacity(candidates.len());
        let mut stats = StatsAccumulator::new();
        let batch_count = candidates.len().div_ceil(BATCH_SIZE);

        for (index, batch) in candidates.chunks(BATCH_SIZE).enumerate() {
            self.check_cancelled()?;

            let pending: Vec<&Candidate> = batch
                .iter()
                .filter(|c| processed.insert(c.path.as_path()))
                .collect();

            let batch_records: Vec<FileRecord> = pending
                .par_iter()
                .filter_map(|candidate| document_file(policy, candidate))
                .collect();

            let batch_stats = batch_records
                .iter()
                .fold(StatsAccumulator::new(), |mut acc, record| {
                    acc.record(record);
                    acc
                });
            stats = stats.merge(batch_stats);
            records.extend(batch_records);

            let percent = 30 + 50 * (index + 1) / batch_count;
            self.report(
                format!(
                    "Documented {} of {} files",
                    processed.len(),
                    candidates.len()
                ),
                percent as u8,
            );
        }

        Ok((records, stats))
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, WalkError> {
    let resolved = root.canonicalize().map_err(|_| WalkError::NotFound {
        path: root.to_path_buf(),
    })?;
    if !resolved.is_dir() {
        return Err(WalkError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(resolved)
}

/// Read one candidate into a record, or `None` when it is skipped or
/// unreadable.
fn document_file(policy: &InclusionPolicy, candidate: &Candidate) -> Option<FileRecord> {
    let rules = ContentRules {
        max_size: policy.max_size_for(&candidate.path),
        skip_binary: policy.skip_binary(),
        skip_generated: policy.skip_generated(),
    };

    match classify_file(&candidate.path, rules) {
        Ok(Classification::Text(text)) => Some(FileRecord::from_text(&*candidate.relative, text)),
        Ok(Classification::Skipped(reason)) => {
            tracing::debug!(path = %candidate.relative, %reason, "skipped");
            None
        }
        Err(e) => {
            tracing::warn!(path = %candidate.relative, error = %e, "cannot read file");
            None
        }
    }
}

// ============================================================================
// Functional API
// ============================================================================

/// Document a project with its resolved configuration and write the
/// output file.
///
/// # Examples
///
/// ```no_run
/// use cartographer::builder::document_path;
/// use cartographer::config::Settings;
///
/// let (payload, path) = document_path("./project", &Settings::default()).unwrap();
/// println!("{} tokens written to {}", payload.statistics.token_estimate, path.display());
/// ```
pub fn document_path(
    root: impl AsRef<Path>,
    settings: &Settings,
) -> Result<(OutputPayload, PathBuf), CartographerError> {
    let root = root.as_ref();
    let config = Config::load(root, settings);
    Cartographer::new(root, config).document()
}

/// Content-free analysis of a project.
pub fn analyze(root: impl AsRef<Path>, settings: &Settings) -> Result<QuickAnalysis, CartographerError> {
    let root = resolve_root(root.as_ref())?;
    let config = Config::load(&root, settings);
    let policy = Arc::new(InclusionPolicy::new(&root, config)?);
    Ok(quick_analysis(&policy)?)
}

/// Build the file tree of a project.
pub fn structure_from_path(
    root: impl AsRef<Path>,
    settings: &Settings,
) -> Result<FileNode, CartographerError> {
    let root = resolve_root(root.as_ref())?;
    let config = Config::load(&root, settings);
    let policy = Arc::new(InclusionPolicy::new(&root, config)?);
    Ok(build_structure(&policy, None)?)
}
