//! Output assembler.
//!
//! Writes the rendered document to disk and records a build manifest next to
//! it (`<output>.manifest.json`) listing every source with its checksum. The
//! manifest is a sidecar so the rendered output itself stays byte-identical
//! across repeated builds of unchanged sources.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use sheetsmith_shared::{
    BuildId, BuildManifest, CURRENT_SCHEMA_VERSION, OutputFormat, Result, SheetsmithError,
    SourceMeta, sha256_hex,
};

use crate::loader::DocumentSet;
use crate::render::Rendered;

/// Suffix appended to the output path for the manifest sidecar.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Configuration for assembling one build.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Where the rendered document is written.
    pub output: PathBuf,
    pub format: OutputFormat,
    /// Configured version string, recorded in the manifest.
    pub version: Option<String>,
    pub excluded_tags: Vec<String>,
    pub only_tags: Vec<String>,
    /// Tool version string.
    pub tool_version: String,
    /// Whether to write the manifest sidecar.
    pub write_manifest: bool,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    pub output: PathBuf,
    /// Path of the manifest sidecar, if written.
    pub manifest_path: Option<PathBuf>,
    pub manifest: BuildManifest,
}

/// Write the rendered output and (optionally) its manifest.
#[instrument(skip_all, fields(output = %config.output.display(), bytes = rendered.text.len()))]
pub fn assemble(
    set: &DocumentSet,
    rendered: &Rendered,
    config: &AssembleConfig,
) -> Result<AssembleResult> {
    write_atomic(&config.output, rendered.text.as_bytes())?;

    let manifest = build_manifest(set, rendered, config);
    let manifest_path = if config.write_manifest {
        let path = manifest_path(&config.output);
        write_json(&path, &manifest)?;
        Some(path)
    } else {
        None
    };

    info!(
        output = %config.output.display(),
        sources = manifest.sources.len(),
        "output assembled"
    );

    Ok(AssembleResult {
        output: config.output.clone(),
        manifest_path,
        manifest,
    })
}

/// Path of the manifest sidecar for an output file.
pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(MANIFEST_SUFFIX);
    PathBuf::from(name)
}

/// Build the manifest for a rendered document set.
pub fn build_manifest(
    set: &DocumentSet,
    rendered: &Rendered,
    config: &AssembleConfig,
) -> BuildManifest {
    let sources = set
        .documents()
        .iter()
        .map(|doc| SourceMeta {
            path: set.relative_path(&doc.document.path),
            sha256: doc.sha256.clone(),
            lines: doc.document.text_line_count(),
        })
        .collect();

    BuildManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: BuildId::new(),
        title: rendered.title.clone(),
        version: config.version.clone(),
        tool_version: config.tool_version.clone(),
        format: config.format.as_str().to_string(),
        root: set.root().document.path.display().to_string(),
        output: config
            .output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        output_sha256: sha256_hex(rendered.text.as_bytes()),
        output_bytes: rendered.text.len(),
        excluded_tags: config.excluded_tags.clone(),
        only_tags: config.only_tags.clone(),
        sources,
        toc: rendered.toc.clone(),
        built_at: Utc::now(),
    }
}

/// Read and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<BuildManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| SheetsmithError::io(path, e))?;
    let manifest: BuildManifest = serde_json::from_str(&content)
        .map_err(|e| SheetsmithError::validation(format!("invalid manifest {}: {e}", path.display())))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(SheetsmithError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// State of a recorded file compared with disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Unchanged,
    Changed,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub path: String,
    pub status: FileStatus,
}

/// Result of comparing a manifest against the files on disk.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub title: String,
    pub output: FileCheck,
    pub sources: Vec<FileCheck>,
}

impl VerifyReport {
    /// Whether the output and every source still match the manifest.
    pub fn is_clean(&self) -> bool {
        self.output.status == FileStatus::Unchanged
            && self.sources.iter().all(|s| s.status == FileStatus::Unchanged)
    }

    /// Sources that changed or disappeared since the build.
    pub fn stale_sources(&self) -> impl Iterator<Item = &FileCheck> {
        self.sources
            .iter()
            .filter(|s| s.status != FileStatus::Unchanged)
    }
}

/// Compare a manifest with the current output and sources.
///
/// The output is looked up next to the manifest; sources relative to the
/// recorded root document's directory.
#[instrument(skip_all, fields(manifest = %manifest_file.display()))]
pub fn verify_manifest(manifest_file: &Path) -> Result<VerifyReport> {
    let manifest = load_manifest(manifest_file)?;

    let output_dir = manifest_file.parent().unwrap_or(Path::new(""));
    let output = FileCheck {
        status: file_status(&output_dir.join(&manifest.output), &manifest.output_sha256),
        path: manifest.output.clone(),
    };

    let root = PathBuf::from(&manifest.root);
    let base = root.parent().unwrap_or(Path::new(""));
    let sources: Vec<FileCheck> = manifest
        .sources
        .iter()
        .map(|source| FileCheck {
            status: file_status(&base.join(&source.path), &source.sha256),
            path: source.path.clone(),
        })
        .collect();

    let report = VerifyReport {
        title: manifest.title,
        output,
        sources,
    };
    debug!(
        clean = report.is_clean(),
        stale = report.stale_sources().count(),
        "manifest verified"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn file_status(path: &Path, expected_sha256: &str) -> FileStatus {
    match std::fs::read(path) {
        Ok(bytes) if sha256_hex(&bytes) == expected_sha256 => FileStatus::Unchanged,
        Ok(_) => FileStatus::Changed,
        Err(_) => FileStatus::Missing,
    }
}

/// Write a file atomically (write to temp, then rename).
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SheetsmithError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| SheetsmithError::validation(format!("invalid output path {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| SheetsmithError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| SheetsmithError::io(path, e))?;

    debug!(path = %path.display(), size = content.len(), "wrote file");
    Ok(())
}

/// Write a JSON file (pretty-printed).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(data).map_err(|e| {
        SheetsmithError::validation(format!("JSON serialization failed: {e}"))
    })?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DocumentSet;
    use crate::render::render;
    use sheetsmith_shared::RenderConfig;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sheetsmith-assembler-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::canonicalize(dir).unwrap()
    }

    fn make_config(output: PathBuf) -> AssembleConfig {
        AssembleConfig {
            output,
            format: OutputFormat::Asciidoc,
            version: Some("1.0".into()),
            excluded_tags: vec!["update_*".into()],
            only_tags: vec![],
            tool_version: "0.1.0-test".into(),
            write_manifest: true,
        }
    }

    fn build(tmp: &Path) -> AssembleResult {
        let root = tmp.join("src/index.adoc");
        std::fs::create_dir_all(root.parent().unwrap()).unwrap();
        std::fs::write(&root, "= Sheet\n\ninclude::part.adoc[]\n").unwrap();
        std::fs::write(tmp.join("src/part.adoc"), "== Part\ntext\n").unwrap();

        let mut set = DocumentSet::open(&root).unwrap();
        let rendered = render(&mut set, &RenderConfig::default()).unwrap();
        assemble(&set, &rendered, &make_config(tmp.join("out/sheet.adoc"))).unwrap()
    }

    #[test]
    fn assemble_writes_output_and_manifest() {
        let tmp = temp_dir();
        let result = build(&tmp);

        let written = std::fs::read_to_string(&result.output).unwrap();
        assert!(written.starts_with("= Sheet\n"));
        assert!(written.contains("== Part\ntext\n"));
        assert!(!tmp.join("out/.sheet.adoc.tmp").exists());

        let manifest_file = result.manifest_path.unwrap();
        assert_eq!(manifest_file, tmp.join("out/sheet.adoc.manifest.json"));
        let manifest = load_manifest(&manifest_file).unwrap();
        assert_eq!(manifest.title, "Sheet");
        assert_eq!(manifest.output, "sheet.adoc");
        assert_eq!(manifest.output_sha256, sha256_hex(written.as_bytes()));
        let sources: Vec<_> = manifest.sources.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(sources, vec!["index.adoc", "part.adoc"]);
        assert_eq!(manifest.excluded_tags, vec!["update_*"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn verify_detects_changed_and_missing_files() {
        let tmp = temp_dir();
        let result = build(&tmp);
        let manifest_file = result.manifest_path.unwrap();

        let report = verify_manifest(&manifest_file).unwrap();
        assert!(report.is_clean());

        std::fs::write(tmp.join("src/part.adoc"), "== Part\nedited\n").unwrap();
        std::fs::remove_file(&result.output).unwrap();

        let report = verify_manifest(&manifest_file).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.output.status, FileStatus::Missing);
        let stale: Vec<_> = report.stale_sources().map(|s| (s.path.as_str(), s.status)).collect();
        assert_eq!(stale, vec![("part.adoc", FileStatus::Changed)]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let tmp = temp_dir();
        let result = build(&tmp);
        let manifest_file = result.manifest_path.unwrap();

        let content = std::fs::read_to_string(&manifest_file).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&content).unwrap();
        value["schema_version"] = serde_json::json!(99);
        std::fs::write(&manifest_file, value.to_string()).unwrap();

        assert!(matches!(
            load_manifest(&manifest_file),
            Err(SheetsmithError::Validation { .. })
        ));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn manifest_path_appends_suffix() {
        assert_eq!(
            manifest_path(Path::new("build/sheet.html")),
            PathBuf::from("build/sheet.html.manifest.json")
        );
    }
}
