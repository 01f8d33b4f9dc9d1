//! Document loader.
//!
//! A [`DocumentSet`] starts with the root document and grows as the renderer
//! reaches `include::` directives on the active path: targets inside an
//! inactive conditional or an excluded tag region are never read. Documents
//! are keyed by canonical path, so a document reached again by a different
//! route is loaded once and shared. [`IncludeStack`] tracks the active include
//! chain; a document already on it is a cycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use sheetsmith_markup::{parse_file, resolve_target, tags};
use sheetsmith_shared::{Document, Result, SheetsmithError, sha256_hex};

/// A parsed source document.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    /// SHA-256 of the raw file content.
    pub sha256: String,
}

/// The documents reachable from a root, in first-visit order.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    documents: Vec<LoadedDocument>,
    index: HashMap<PathBuf, usize>,
}

impl DocumentSet {
    /// Load the root document.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn open(root: &Path) -> Result<Self> {
        let root = std::fs::canonicalize(root).map_err(|e| SheetsmithError::io(root, e))?;
        let mut set = Self {
            documents: Vec::new(),
            index: HashMap::new(),
        };
        set.load(&root)?;
        Ok(set)
    }

    /// The root document (always index 0).
    pub fn root(&self) -> &LoadedDocument {
        &self.documents[0]
    }

    pub fn get(&self, idx: usize) -> &LoadedDocument {
        &self.documents[idx]
    }

    /// All documents in load order, root first.
    pub fn documents(&self) -> &[LoadedDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Index of a loaded document by canonical path.
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Directory containing the root document.
    pub fn base_dir(&self) -> &Path {
        self.root().document.path.parent().unwrap_or(Path::new(""))
    }

    /// Path of a document relative to the root's directory, `/`-separated.
    pub fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.base_dir()).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolve an include target (already attribute-substituted) relative to
    /// the including document and load it.
    ///
    /// Returns `None` for a missing `opts=optional` target.
    pub fn include(
        &mut self,
        from: &Path,
        line: usize,
        target: &str,
        optional: bool,
    ) -> Result<Option<usize>> {
        let target = resolve_target(from, target);
        if !target.is_file() {
            if optional {
                warn!(
                    target = %target.display(),
                    from = %from.display(),
                    line,
                    "optional include not found, skipping"
                );
                return Ok(None);
            }
            return Err(SheetsmithError::MissingInclude {
                target,
                from: from.to_path_buf(),
                line,
            });
        }

        let canonical = std::fs::canonicalize(&target).map_err(|e| SheetsmithError::io(&target, e))?;
        self.load(&canonical).map(Some)
    }

    /// Load a document by canonical path unless it is already loaded.
    fn load(&mut self, path: &Path) -> Result<usize> {
        if let Some(idx) = self.position(path) {
            debug!(path = %path.display(), "document already loaded");
            return Ok(idx);
        }

        let (document, source) = parse_file(path)?;
        tags::check_balanced(&document)?;

        let idx = self.documents.len();
        self.documents.push(LoadedDocument {
            document,
            sha256: sha256_hex(source.as_bytes()),
        });
        self.index.insert(path.to_path_buf(), idx);
        debug!(path = %path.display(), idx, "loaded document");
        Ok(idx)
    }
}

/// The chain of documents currently being spliced, outermost first.
#[derive(Debug, Clone)]
pub struct IncludeStack {
    paths: Vec<PathBuf>,
    max_depth: usize,
}

impl IncludeStack {
    /// `max_depth` is the allowed include nesting depth; the root is depth 0.
    pub fn new(max_depth: usize) -> Self {
        Self {
            paths: Vec::new(),
            max_depth,
        }
    }

    /// Enter `path`, rejecting cycles and nesting beyond the maximum depth.
    pub fn enter(&mut self, path: &Path) -> Result<()> {
        if let Some(pos) = self.paths.iter().position(|p| p == path) {
            let mut chain = self.paths[pos..].to_vec();
            chain.push(path.to_path_buf());
            return Err(SheetsmithError::IncludeCycle { chain });
        }
        if self.paths.len() > self.max_depth {
            return Err(SheetsmithError::IncludeDepth {
                path: path.to_path_buf(),
                max: self.max_depth,
            });
        }
        self.paths.push(path.to_path_buf());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.paths.pop();
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.paths.len()
    }
}
