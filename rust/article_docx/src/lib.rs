//! Semantic-HTML articles to `.docx`.
//!
//! [`parser`] reduces generated markup to a flat [`ContentBlock`] sequence,
//! [`render`] lays the blocks out under a title and definition, and [`docx`]
//! packages the result as WordprocessingML.

pub mod blocks;
pub mod docx;
pub mod error;
pub mod parser;
pub mod render;

use std::path::Path;

pub use blocks::{ContentBlock, HeadingLevel, ListKind};
pub use error::RenderError;
pub use parser::{parse_article, ContentBlockParser, HtmlEvent, ParseWarning, ParsedArticle};
pub use render::{render, Paragraph, ParagraphStyle, RenderedDocument, Run};

/// Parses `html`, renders it under `title` and `definition`, and saves the
/// document at `path`. Returns the parser's warnings.
pub fn write_article(
    path: &Path,
    title: &str,
    definition: &str,
    html: &str,
) -> Result<Vec<ParseWarning>, RenderError> {
    let parsed = parse_article(html);
    let doc = render(title, definition, &parsed.blocks)?;
    docx::save(&doc, path)?;
    Ok(parsed.warnings)
}
