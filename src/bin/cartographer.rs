//! Cartographer CLI - Snapshot a project's structure and contents for LLMs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cartographer::builder::{analyze, Cartographer};
use cartographer::config::{
    regenerate_defaults, Config, DocumentationType, OutputFormat, OutputLayer, Settings,
};
use cartographer::errors::{exit_code, CartographerError};
use cartographer::output::{OutputError, OutputPayload};
use cartographer::progress::LogProgress;
use cartographer::tree::{format_number, format_size};
use cartographer::walker::WalkError;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cartographer")]
#[command(about = "Snapshot a project's structure and contents for LLM context")]
#[command(version)]
struct Cli {
    /// Log progress and decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Document a project and write the snapshot file
    Document {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// What to document
        #[arg(long = "type", value_enum)]
        kind: Option<TypeArg>,

        /// Output format (inferred from --output when omitted)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Output file, relative to the project root
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document only paths matching these globs
        #[arg(long)]
        select: Vec<String>,

        /// Skip files larger than this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Document files that look binary
        #[arg(long)]
        include_binary: bool,

        /// Document files marked as generated
        #[arg(long)]
        include_generated: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count included files by type and top-level directory
    Analyze {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration file
    Init {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    Structure,
    Documentation,
    Both,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Text,
    Csv,
}

impl From<TypeArg> for DocumentationType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Structure => DocumentationType::Structure,
            TypeArg::Documentation => DocumentationType::Documentation,
            TypeArg::Both => DocumentationType::Both,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Document {
            path,
            kind,
            format,
            output,
            select,
            max_file_size,
            include_binary,
            include_generated,
            json,
        } => {
            let settings = Settings {
                max_file_size,
                skip_binary_files: include_binary.then_some(false),
                skip_generated_files: include_generated.then_some(false),
                output: Some(OutputLayer {
                    kind: kind.map(Into::into),
                    format: format
                        .map(Into::into)
                        .or_else(|| output.as_deref().map(OutputFormat::from_path)),
                    path: output,
                }),
                ..Settings::default()
            };
            run_document(path, &settings, &select, cli.verbose, json)
        }
        Commands::Analyze { path, json } => run_analyze(path, json),
        Commands::Init { path, force, json } => run_init(path, force, json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "cartographer", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
                code: i32,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
                code: exit_code(&e),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Document { json, .. } => *json,
        Commands::Analyze { json, .. } => *json,
        Commands::Init { json, .. } => *json,
        Commands::Completions { .. } => false,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CartographerError> {
    let json = serde_json::to_string_pretty(value).map_err(OutputError::from)?;
    println!("{json}");
    Ok(())
}

// --- Document command ---

/// Expand `--select` globs against the project root.
///
/// Matches are absolute, so they stay valid whatever the working
/// directory is relative to the root.
fn expand_select(root: &Path, select: &[String]) -> Vec<PathBuf> {
    let root = match root.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "cannot resolve project root");
            return Vec::new();
        }
    };
    let Some(root_str) = root.to_str() else {
        tracing::warn!(root = %root.display(), "project root is not valid UTF-8");
        return Vec::new();
    };
    let escaped_root = glob::Pattern::escape(root_str);

    let mut paths = Vec::new();
    for expression in select {
        let pattern = format!("{}/{}", escaped_root.trim_end_matches('/'), expression);

        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(select = %expression, error = %e, "invalid selection glob");
                continue;
            }
        };

        let before = paths.len();
        paths.extend(entries.filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable selection match");
                None
            }
        }));
        if paths.len() == before {
            tracing::warn!(select = %expression, "selection matched nothing");
        }
    }
    paths
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSummary {
    output: PathBuf,
    format: OutputFormat,
    documentation_type: DocumentationType,
    total_files: usize,
    documented_files: usize,
    skipped_files: usize,
    documented_size: u64,
    token_estimate: usize,
    duration_ms: u64,
}

impl DocumentSummary {
    fn new(payload: &OutputPayload, output: PathBuf, format: OutputFormat) -> Self {
        let stats = &payload.statistics;
        Self {
            output,
            format,
            documentation_type: payload.metadata.documentation_type,
            total_files: stats.total_files,
            documented_files: stats.documented_files,
            skipped_files: stats.skipped_files,
            documented_size: stats.documented_size,
            token_estimate: stats.token_estimate,
            duration_ms: stats.duration_ms,
        }
    }
}

fn run_document(
    path: PathBuf,
    settings: &Settings,
    select: &[String],
    verbose: bool,
    json: bool,
) -> Result<(), CartographerError> {
    let config = Config::load(&path, settings);
    let format = config.output.format;

    let mut cartographer = Cartographer::new(&path, config);
    if !select.is_empty() {
        cartographer = cartographer.selection(expand_select(&path, select));
    }
    if verbose {
        cartographer = cartographer.progress(Arc::new(LogProgress));
    }

    let (payload, written) = cartographer.document()?;
    let summary = DocumentSummary::new(&payload, written, format);

    if json {
        print_json(&summary)?;
    } else {
        println!("Wrote {} ({})", summary.output.display(), summary.format);
        println!(
            "Documented {} of {} files ({} skipped), {}",
            format_number(summary.documented_files),
            format_number(summary.total_files),
            format_number(summary.skipped_files),
            format_size(summary.documented_size)
        );
        println!(
            "Estimated tokens: {} in {}ms",
            format_number(summary.token_estimate),
            summary.duration_ms
        );
    }

    Ok(())
}

// --- Analyze command ---

fn run_analyze(path: PathBuf, json: bool) -> Result<(), CartographerError> {
    let analysis = analyze(&path, &Settings::default())?;

    if json {
        print_json(&analysis)?;
    } else {
        println!("Total files: {}", format_number(analysis.total_files));
        println!("\nFile types:");
        for (extension, count) in &analysis.file_types_histogram {
            println!("  {:12} {}", extension, format_number(*count));
        }
        println!("\nTop-level directories:");
        for (directory, count) in &analysis.top_level_directory_histogram {
            println!("  {:12} {}", directory, format_number(*count));
        }
    }

    Ok(())
}

// --- Init command ---

fn run_init(path: PathBuf, force: bool, json: bool) -> Result<(), CartographerError> {
    if !path.is_dir() {
        return Err(WalkError::NotFound { path }.into());
    }

    let (config, written) = regenerate_defaults(&path, force)?;

    if json {
        #[derive(Serialize)]
        struct Output {
            path: PathBuf,
            config: Config,
        }
        print_json(&Output {
            path: written,
            config,
        })?;
    } else {
        println!("Wrote default configuration to {}", written.display());
    }

    Ok(())
}
