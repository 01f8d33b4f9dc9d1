//! Application configuration for sheetsmith.
//!
//! A project config lives at `sheetsmith.toml` next to the root document; a
//! user config may live at `~/.sheetsmith/sheetsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetsmithError};
use crate::types::Attributes;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "sheetsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sheetsmith";

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// Rendered output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Assembled single-file AsciiDoc, ready for a PDF toolchain.
    #[default]
    Asciidoc,
    /// Standalone HTML5 page.
    Html,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asciidoc => "asciidoc",
            Self::Html => "html",
        }
    }

    /// File extension used for default output names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Asciidoc => "adoc",
            Self::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SheetsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asciidoc" | "adoc" => Ok(Self::Asciidoc),
            "html" => Ok(Self::Html),
            other => Err(SheetsmithError::config(format!(
                "unknown output format `{other}` (expected asciidoc or html)"
            ))),
        }
    }
}

/// What to do with a `{name}` reference that has no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAttributePolicy {
    /// Fail the build.
    #[default]
    Error,
    /// Leave the reference in the output verbatim and log a warning.
    Passthrough,
}

impl FromStr for MissingAttributePolicy {
    type Err = SheetsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(Self::Error),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(SheetsmithError::config(format!(
                "unknown missing-attribute policy `{other}` (expected error or passthrough)"
            ))),
        }
    }
}

/// Where page breaks are inserted in the assembled document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageBreaks {
    /// Only explicit `<<<` lines.
    #[default]
    None,
    /// Before every level-1 section after the first.
    Chapters,
}

impl FromStr for PageBreaks {
    type Err = SheetsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "chapters" => Ok(Self::Chapters),
            other => Err(SheetsmithError::config(format!(
                "unknown page break mode `{other}` (expected none or chapters)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching sheetsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document-level attributes.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Tag selection.
    #[serde(default)]
    pub tags: TagsConfig,

    /// Include resolution limits.
    #[serde(default)]
    pub include: IncludeConfig,
}

/// `[document]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Document title; falls back to the root document's `= Title` line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Author line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Version string, exposed as `{version}` and `{revnumber}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Additional attributes, exposed as `{name}`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub missing_attribute: MissingAttributePolicy,

    #[serde(default)]
    pub page_breaks: PageBreaks,

    /// Emit a table of contents.
    #[serde(default = "default_true")]
    pub toc: bool,

    /// Deepest section level listed in the TOC.
    #[serde(default = "default_toc_levels")]
    pub toc_levels: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            missing_attribute: MissingAttributePolicy::default(),
            page_breaks: PageBreaks::default(),
            toc: true,
            toc_levels: default_toc_levels(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_toc_levels() -> u8 {
    2
}

/// `[tags]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Tag patterns whose regions are removed (`update_*` matches by prefix).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// When non-empty, only lines inside one of these tags are kept.
    #[serde(default)]
    pub only: Vec<String>,
}

/// `[include]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeConfig {
    /// Maximum include nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    64
}

// ---------------------------------------------------------------------------
// Render config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime render configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub title: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    /// Custom invocation attributes.
    pub attributes: BTreeMap<String, String>,
    pub format: OutputFormat,
    pub missing_attribute: MissingAttributePolicy,
    pub page_breaks: PageBreaks,
    pub toc: bool,
    pub toc_levels: u8,
    pub exclude_tags: Vec<String>,
    pub only_tags: Vec<String>,
    pub max_include_depth: usize,
}

impl From<&AppConfig> for RenderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            title: config.document.title.clone(),
            author: config.document.author.clone(),
            version: config.document.version.clone(),
            attributes: config.document.attributes.clone(),
            format: config.output.format,
            missing_attribute: config.output.missing_attribute,
            page_breaks: config.output.page_breaks,
            toc: config.output.toc,
            toc_levels: config.output.toc_levels,
            exclude_tags: config.tags.exclude.clone(),
            only_tags: config.tags.only.clone(),
            max_include_depth: config.include.max_depth,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl RenderConfig {
    /// The locked invocation attribute set.
    ///
    /// `title`, `author` and `version` are exposed under their AsciiDoc names
    /// as well (`doctitle`, `revnumber`). Explicit custom attributes win.
    pub fn invocation_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        if let Some(title) = &self.title {
            attrs.set_locked("doctitle", title.clone());
        }
        if let Some(author) = &self.author {
            attrs.set_locked("author", author.clone());
        }
        if let Some(version) = &self.version {
            attrs.set_locked("version", version.clone());
            attrs.set_locked("revnumber", version.clone());
        }
        for (name, value) in &self.attributes {
            attrs.set_locked(name.clone(), value.clone());
        }
        attrs
    }
}

/// Parse a `name=value` CLI attribute. A bare `name` sets an empty value.
pub fn parse_attribute_arg(arg: &str) -> Result<(String, String)> {
    let (name, value) = match arg.split_once('=') {
        Some((n, v)) => (n.trim(), v),
        None => (arg.trim(), ""),
    };
    if !is_valid_attribute_name(name) {
        return Err(SheetsmithError::config(format!(
            "invalid attribute name `{name}` in `{arg}`"
        )));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Attribute names: a word character first, then word characters or `-`.
pub fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.sheetsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SheetsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.sheetsmith/sheetsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the user config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SheetsmithError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SheetsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve the config for a build.
///
/// Lookup order: an explicit path, `sheetsmith.toml` in `project_dir`, the
/// user config, built-in defaults.
pub fn resolve_config(explicit: Option<&Path>, project_dir: &Path) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let local = project_dir.join(CONFIG_FILE_NAME);
    if local.is_file() {
        tracing::debug!(path = %local.display(), "using project config");
        return load_config_from(&local);
    }

    load_config()
}

/// Write a default config file into `dir`. Returns the path to the created file.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SheetsmithError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(SheetsmithError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SheetsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SheetsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Create the user config directory and write a default config file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Check value ranges that serde cannot express.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if !(1..=5).contains(&config.output.toc_levels) {
        return Err(SheetsmithError::config(format!(
            "output.toc_levels must be between 1 and 5, got {}",
            config.output.toc_levels
        )));
    }
    if config.include.max_depth == 0 {
        return Err(SheetsmithError::config("include.max_depth must be at least 1"));
    }
    for name in config.document.attributes.keys() {
        if !is_valid_attribute_name(name) {
            return Err(SheetsmithError::config(format!(
                "invalid attribute name `{name}` in [document.attributes]"
            )));
        }
    }
    for pattern in config.tags.exclude.iter().chain(&config.tags.only) {
        if pattern.trim().is_empty() {
            return Err(SheetsmithError::config("empty tag pattern in [tags]"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sheetsmith-config-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("format = \"asciidoc\""));
        assert!(toml_str.contains("max_depth = 64"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.output.toc_levels, 2);
        assert_eq!(parsed.output.missing_attribute, MissingAttributePolicy::Error);
    }

    #[test]
    fn config_with_document_and_tags() {
        let toml_str = r#"
[document]
title = "Framework Cheat Sheet"
version = "3.2.0"

[document.attributes]
project-name = "demo"

[output]
format = "html"
page_breaks = "chapters"

[tags]
exclude = ["update_*"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.output.format, OutputFormat::Html);
        assert_eq!(config.output.page_breaks, PageBreaks::Chapters);
        assert_eq!(config.tags.exclude, vec!["update_*".to_string()]);

        let render = RenderConfig::from(&config);
        let attrs = render.invocation_attributes();
        assert_eq!(attrs.get("version"), Some("3.2.0"));
        assert_eq!(attrs.get("revnumber"), Some("3.2.0"));
        assert_eq!(attrs.get("doctitle"), Some("Framework Cheat Sheet"));
        assert_eq!(attrs.get("project-name"), Some("demo"));
        assert!(attrs.is_locked("version"));
    }

    #[test]
    fn render_config_from_app_config() {
        let render = RenderConfig::default();
        assert_eq!(render.format, OutputFormat::Asciidoc);
        assert_eq!(render.max_include_depth, 64);
        assert!(render.toc);
        assert!(render.exclude_tags.is_empty());
    }

    #[test]
    fn attribute_arg_parsing() {
        assert_eq!(
            parse_attribute_arg("version=3.2.0").unwrap(),
            ("version".to_string(), "3.2.0".to_string())
        );
        assert_eq!(
            parse_attribute_arg("draft").unwrap(),
            ("draft".to_string(), String::new())
        );
        assert_eq!(
            parse_attribute_arg("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_attribute_arg("=oops").is_err());
        assert!(parse_attribute_arg("bad name=x").is_err());
    }

    #[test]
    fn enum_settings_parse() {
        assert_eq!("html".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("adoc".parse::<OutputFormat>().unwrap(), OutputFormat::Asciidoc);
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(
            "passthrough".parse::<MissingAttributePolicy>().unwrap(),
            MissingAttributePolicy::Passthrough
        );
        assert_eq!("chapters".parse::<PageBreaks>().unwrap(), PageBreaks::Chapters);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.output.toc_levels = 9;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.include.max_depth = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.tags.exclude.push("  ".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn project_config_is_preferred() {
        let tmp = temp_dir();
        std::fs::write(
            tmp.join(CONFIG_FILE_NAME),
            "[document]\nversion = \"9.9\"\n",
        )
        .unwrap();

        let config = resolve_config(None, &tmp).unwrap();
        assert_eq!(config.document.version.as_deref(), Some("9.9"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let tmp = temp_dir();
        let path = init_config_in(&tmp).unwrap();
        assert!(path.exists());
        assert!(load_config_from(&path).is_ok());
        assert!(init_config_in(&tmp).is_err());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
