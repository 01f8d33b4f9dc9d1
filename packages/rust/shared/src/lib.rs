//! Shared types, error model, and configuration for sheetsmith.
//!
//! This crate is the foundation depended on by all other sheetsmith crates.
//! It provides:
//! - [`SheetsmithError`]: the unified error type
//! - The source document model ([`Document`], [`Block`], [`Directive`])
//! - Domain types ([`Attributes`], [`Toc`], [`BuildManifest`], [`BuildId`])
//! - Configuration ([`AppConfig`], [`RenderConfig`], config loading)

pub mod config;
pub mod document;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DocumentConfig, IncludeConfig, MissingAttributePolicy,
    OutputConfig, OutputFormat, PageBreaks, RenderConfig, TagsConfig, config_dir,
    config_file_path, init_config, init_config_in, is_valid_attribute_name, load_config,
    load_config_from, parse_attribute_arg, resolve_config, validate_config,
};
pub use document::{
    AttributeEntry, Block, BlockKind, Conditional, ConditionalKind, Directive, Document,
    IncludeDirective, LevelOffset, MatchMode, TagBoundary, TagMarker,
};
pub use error::{Result, SheetsmithError};
pub use types::{
    Attributes, BuildId, BuildManifest, CURRENT_SCHEMA_VERSION, SourceMeta, Toc, TocEntry,
    sha256_hex,
};
