//! Document assembly for sheetsmith.
//!
//! - [`loader`]: the document set, include resolution and the include stack
//! - [`render`]: walks active includes, filters, substitutes and emits output
//! - [`toc`]: section headings and table of contents
//! - [`assembler`]: writes output and the build manifest
//! - [`pipeline`]: end-to-end `build`, `check` and `tags` flows

pub mod assembler;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod toc;
