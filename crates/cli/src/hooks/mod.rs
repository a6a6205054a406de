//! Collaborators the driver calls between turns.

pub mod code;
pub mod export;

pub use code::{CodeExtractor, code_files, extract_blocks};
pub use export::{MarkdownExporter, render_markdown, render_summary};
