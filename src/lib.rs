//! Cartographer - Snapshot a project's structure and contents for LLMs.
//!
//! Cartographer walks a project tree under a layered inclusion policy
//! (glob patterns, ignore files, per-path overrides), reads every included
//! text file, and produces a single payload holding the file tree, file
//! contents, and run statistics, serialized as JSON, text, or CSV.
//!
//! # Quick Start
//!
//! ```no_run
//! use cartographer::builder::Cartographer;
//! use cartographer::config::{Config, Settings};
//!
//! let config = Config::load("./my-project".as_ref(), &Settings::default());
//! let payload = Cartographer::new("./my-project", config).run().unwrap();
//!
//! println!("Documented {} files", payload.files.len());
//! println!("Estimated tokens: {}", payload.statistics.token_estimate);
//! ```
//!
//! # Modules
//!
//! - [`patterns`] - Glob matching for include/exclude rules
//! - [`ignore_rules`] - `.gitignore` / `.cartographerignore` handling
//! - [`config`] - Layered configuration and the project config file
//! - [`policy`] - Inclusion decisions compiled from a configuration
//! - [`walker`] - Directory traversal and quick analysis
//! - [`classify`] - Binary, generated-file, and encoding detection
//! - [`tokens`] - Token estimates and line counts
//! - [`tree`] - File tree representation and rendering
//! - [`stats`] - Run statistics
//! - [`output`] - JSON, text, and CSV serialization
//! - [`progress`] - Progress events and cancellation
//! - [`builder`] - Fluent API for a documentation run

pub mod patterns;
pub mod ignore_rules;
pub mod config;
pub mod errors;
pub mod policy;
pub mod classify;
pub mod tokens;
pub mod tree;
pub mod walker;
pub mod stats;
pub mod progress;
pub mod output;
pub mod builder;

// Re-export key types at crate root for convenience
pub use builder::{Cartographer, BATCH_SIZE};
pub use config::{Config, ConfigError, DocumentationType, OutputFormat, Settings};
pub use errors::CartographerError;
pub use output::{FileRecord, OutputError, OutputPayload, ProjectMetadata};
pub use patterns::PatternError;
pub use policy::InclusionPolicy;
pub use progress::{CancelFlag, ProgressEvent, ProgressSink};
pub use stats::RunStatistics;
pub use tree::{FileNode, NodeKind, RenderOptions};
pub use tokens::estimate_tokens;
pub use walker::{QuickAnalysis, WalkError};
