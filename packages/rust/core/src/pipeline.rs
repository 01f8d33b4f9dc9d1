//! End-to-end pipelines: root document → load → render → assemble.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use sheetsmith_markup::tags::{self, TagRegion};
use sheetsmith_shared::{OutputFormat, RenderConfig, Result, SheetsmithError};

use crate::assembler::{self, AssembleConfig};
use crate::loader::DocumentSet;
use crate::render;

/// Configuration for the `build` pipeline.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root document.
    pub root: PathBuf,
    /// Output path (defaults to [`default_output_path`]).
    pub output: Option<PathBuf>,
    pub render: RenderConfig,
    /// Whether to write the manifest sidecar.
    pub write_manifest: bool,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of the `build` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    pub output: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub title: String,
    /// Number of source documents.
    pub documents: usize,
    /// Size of the rendered output in bytes.
    pub bytes: usize,
    pub toc_entries: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per loaded source document.
    fn document_loaded(&self, path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_loaded(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Default output path next to the root document.
///
/// HTML goes to `<stem>.html`; assembled AsciiDoc to `<stem>-assembled.adoc`
/// so the root source is never overwritten.
pub fn default_output_path(root: &Path, format: OutputFormat) -> PathBuf {
    let stem = root
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let name = match format {
        OutputFormat::Html => format!("{stem}.{}", format.extension()),
        OutputFormat::Asciidoc => format!("{stem}-assembled.{}", format.extension()),
    };
    root.with_file_name(name)
}

/// Run the full `build` pipeline.
///
/// 1. Load the root document
/// 2. Render, loading includes on the active path (tag filtering,
///    conditionals, substitution, emission)
/// 3. Refuse an output that would overwrite a source
/// 4. Write the output and its manifest
#[instrument(skip_all, fields(root = %config.root.display(), format = config.render.format.as_str()))]
pub fn build(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    let start = Instant::now();

    progress.phase("Loading and rendering");
    let mut set = DocumentSet::open(&config.root)?;
    let rendered = render::render(&mut set, &config.render)?;
    for (i, doc) in set.documents().iter().enumerate() {
        progress.document_loaded(&set.relative_path(&doc.document.path), i + 1, set.len());
    }

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&config.root, config.render.format));
    guard_output(&set, &output)?;

    progress.phase("Writing output");
    let assembled = assembler::assemble(
        &set,
        &rendered,
        &AssembleConfig {
            output,
            format: config.render.format,
            version: config.render.version.clone(),
            excluded_tags: config.render.exclude_tags.clone(),
            only_tags: config.render.only_tags.clone(),
            tool_version: config.tool_version.clone(),
            write_manifest: config.write_manifest,
        },
    )?;

    let result = BuildResult {
        output: assembled.output,
        manifest_path: assembled.manifest_path,
        title: rendered.title,
        documents: set.len(),
        bytes: rendered.text.len(),
        toc_entries: rendered.toc.len(),
        elapsed: start.elapsed(),
    };

    info!(
        output = %result.output.display(),
        documents = result.documents,
        bytes = result.bytes,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "build complete"
    );

    progress.done(&result);
    Ok(result)
}

/// Outcome of `check`: the document set loads and renders cleanly.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub title: String,
    /// Source documents on the active path in load order, relative to the
    /// root's directory.
    pub documents: Vec<String>,
    /// Distinct tag names across all sources.
    pub tags: BTreeSet<String>,
    pub headings: usize,
    /// Size the rendered output would have.
    pub bytes: usize,
}

/// Load and render without writing anything.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn check(root: &Path, config: &RenderConfig) -> Result<CheckReport> {
    let mut set = DocumentSet::open(root)?;
    let rendered = render::render(&mut set, config)?;

    let tags = set
        .documents()
        .iter()
        .flat_map(|d| d.document.tag_names())
        .map(String::from)
        .collect();

    Ok(CheckReport {
        title: rendered.title,
        documents: set
            .documents()
            .iter()
            .map(|d| set.relative_path(&d.document.path))
            .collect(),
        tags,
        headings: rendered.headings.len(),
        bytes: rendered.text.len(),
    })
}

/// Tag regions of one source document.
#[derive(Debug, Clone)]
pub struct DocumentTags {
    pub path: String,
    pub regions: Vec<TagRegion>,
}

/// List tag regions of every document on the active path from `root`,
/// skipping documents without any.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn list_tags(root: &Path, config: &RenderConfig) -> Result<Vec<DocumentTags>> {
    let mut set = DocumentSet::open(root)?;
    render::render(&mut set, config)?;
    let mut listing = Vec::new();
    for doc in set.documents() {
        let regions = tags::list_tags(&doc.document)?;
        if !regions.is_empty() {
            listing.push(DocumentTags {
                path: set.relative_path(&doc.document.path),
                regions,
            });
        }
    }
    Ok(listing)
}

/// Refuse to write over a source document.
fn guard_output(set: &DocumentSet, output: &Path) -> Result<()> {
    let Ok(canonical) = std::fs::canonicalize(output) else {
        return Ok(());
    };
    match set.position(&canonical) {
        Some(_) => Err(SheetsmithError::validation(format!(
            "output {} would overwrite source document {}",
            output.display(),
            set.relative_path(&canonical)
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
