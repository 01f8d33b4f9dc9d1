//! Core domain types for sheetsmith builds.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::document::AttributeEntry;

/// Current schema version for the build manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// BuildId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for build identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub Uuid);

impl BuildId {
    /// Generate a new time-sortable build identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BuildId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Attribute values in effect during a render.
///
/// Invocation attributes (config file and CLI) are *locked*: document
/// attribute entries cannot change them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: BTreeMap<String, String>,
    locked: BTreeSet<String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an attribute set where every entry is locked.
    pub fn locked<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut attrs = Self::new();
        for (k, v) in entries {
            attrs.set_locked(k, v);
        }
        attrs
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.locked.contains(name)
    }

    /// Set an attribute and lock it against document entries.
    pub fn set_locked(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.values.insert(name.clone(), value.into());
        self.locked.insert(name);
    }

    /// Apply a document attribute entry. Returns `false` if the attribute is
    /// locked and the entry was ignored.
    pub fn apply(&mut self, entry: &AttributeEntry) -> bool {
        if self.locked.contains(&entry.name) {
            return false;
        }
        match &entry.value {
            Some(value) => {
                self.values.insert(entry.name.clone(), value.clone());
            }
            None => {
                self.values.remove(&entry.name);
            }
        }
        true
    }

    /// Iterate over all values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TocEntry
// ---------------------------------------------------------------------------

/// A single entry in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Display title (attributes already substituted).
    pub title: String,
    /// Anchor id within the rendered document (e.g., `_dependency_injection`).
    pub anchor: String,
    /// Section level (1 = `==`).
    pub level: u8,
    /// Nested child entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

/// Root structure for the table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    /// Top-level sections.
    pub sections: Vec<TocEntry>,
}

impl Toc {
    /// Total number of entries at every depth.
    pub fn len(&self) -> usize {
        fn count(entries: &[TocEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.sections)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BuildManifest
// ---------------------------------------------------------------------------

/// The `<output>.manifest.json` sidecar written next to a rendered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Unique identifier for this build.
    pub id: BuildId,
    /// Document title.
    pub title: String,
    /// Configured version string, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Tool version that produced the build.
    pub tool_version: String,
    /// Output format (`asciidoc` or `html`).
    pub format: String,
    /// Root document path.
    pub root: String,
    /// Output file name.
    pub output: String,
    /// SHA-256 of the rendered output.
    pub output_sha256: String,
    /// Size of the rendered output in bytes.
    pub output_bytes: usize,
    /// Tag patterns excluded from this build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_tags: Vec<String>,
    /// Tag patterns this build was restricted to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only_tags: Vec<String>,
    /// Every source document, in load order.
    pub sources: Vec<SourceMeta>,
    /// Table of contents of the rendered output.
    pub toc: Toc,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
}

/// Metadata for one source document contributing to a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Path relative to the root document's directory.
    pub path: String,
    /// SHA-256 of the raw file content.
    pub sha256: String,
    /// Number of text lines (directives excluded).
    pub lines: usize,
}

/// Hex-encoded SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_id_roundtrip() {
        let id = BuildId::new();
        let s = id.to_string();
        let parsed: BuildId = s.parse().expect("parse BuildId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn locked_attributes_ignore_document_entries() {
        let mut attrs = Attributes::locked([("version", "3.2.0")]);

        let applied = attrs.apply(&AttributeEntry {
            name: "version".into(),
            value: Some("0.0.1".into()),
        });
        assert!(!applied);
        assert_eq!(attrs.get("version"), Some("3.2.0"));

        assert!(attrs.apply(&AttributeEntry {
            name: "icons".into(),
            value: Some("font".into()),
        }));
        assert_eq!(attrs.get("icons"), Some("font"));

        assert!(attrs.apply(&AttributeEntry {
            name: "icons".into(),
            value: None,
        }));
        assert!(!attrs.is_set("icons"));
    }

    #[test]
    fn manifest_serialization() {
        let manifest = BuildManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: BuildId::new(),
            title: "Cheat Sheet".into(),
            version: Some("3.2.0".into()),
            tool_version: "0.1.0".into(),
            format: "html".into(),
            root: "index.adoc".into(),
            output: "cheatsheet.html".into(),
            output_sha256: sha256_hex(b"<html></html>"),
            output_bytes: 13,
            excluded_tags: vec!["update_*".into()],
            only_tags: vec![],
            sources: vec![SourceMeta {
                path: "index.adoc".into(),
                sha256: sha256_hex(b"= Title"),
                lines: 1,
            }],
            toc: Toc::default(),
            built_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        assert!(!json.contains("only_tags"));
        let parsed: BuildManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.excluded_tags, vec!["update_*".to_string()]);
        assert_eq!(parsed.sources.len(), 1);
    }

    #[test]
    fn toc_counts_nested_entries() {
        let toc = Toc {
            sections: vec![TocEntry {
                title: "Core".into(),
                anchor: "_core".into(),
                level: 1,
                children: vec![TocEntry {
                    title: "Injection".into(),
                    anchor: "_injection".into(),
                    level: 2,
                    children: vec![],
                }],
            }],
        };
        assert_eq!(toc.len(), 2);

        let json = serde_json::to_string(&toc).expect("serialize");
        let parsed: Toc = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, toc);
    }

    #[test]
    fn sha256_is_hex_encoded() {
        let digest = sha256_hex(b"abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.starts_with("ba7816bf"));
    }
}
