use crate::blocks::{ContentBlock, ListKind};
use crate::error::RenderError;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    /// Levels 1 through 4.
    Heading(u8),
    Normal,
    ListBullet,
    ListNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text(String),
    Hyperlink { text: String, href: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub runs: Vec<Run>,
}

impl Paragraph {
    fn with_text(style: ParagraphStyle, text: &str) -> Self {
        Self {
            style,
            runs: vec![Run::Text(text.to_string())],
        }
    }

    pub fn plain_text(&self) -> String {
        self.runs
            .iter()
            .map(|r| match r {
                Run::Text(t) => t.as_str(),
                Run::Hyperlink { text, .. } => text.as_str(),
            })
            .collect()
    }
}

/// Title heading, definition paragraph, then the article body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    pub elements: Vec<Paragraph>,
}

impl RenderedDocument {
    fn push(&mut self, paragraph: Paragraph) -> usize {
        self.elements.push(paragraph);
        self.elements.len() - 1
    }

    pub fn hrefs(&self) -> BTreeSet<&str> {
        self.elements
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter_map(|r| match r {
                Run::Hyperlink { href, .. } => Some(href.as_str()),
                Run::Text(_) => None,
            })
            .collect()
    }

    pub fn needs_numbering(&self) -> bool {
        self.elements.iter().any(|p| {
            matches!(p.style, ParagraphStyle::ListBullet | ParagraphStyle::ListNumber)
        })
    }
}

pub(crate) fn sanitize_href(href: &str) -> Option<String> {
    let h = href.trim();
    if h.is_empty() {
        return None;
    }
    let low = h.to_ascii_lowercase();
    if low.starts_with("javascript:") || low.starts_with("data:") || low.starts_with("vbscript:") {
        return None;
    }
    Some(h.to_string())
}

fn link_run(text: &str, href: Option<&str>) -> Run {
    match href.and_then(sanitize_href) {
        Some(href) => Run::Hyperlink {
            text: text.to_string(),
            href,
        },
        None => Run::Text(text.to_string()),
    }
}

pub fn render(
    title: &str,
    definition: &str,
    blocks: &[ContentBlock],
) -> Result<RenderedDocument, RenderError> {
    let mut doc = RenderedDocument::default();
    doc.push(Paragraph::with_text(ParagraphStyle::Heading(1), title));
    doc.push(Paragraph::with_text(ParagraphStyle::Normal, definition));

    // Links attach to the paragraph produced by the latest non-link block.
    let mut anchor: Option<usize> = None;
    for block in blocks {
        let next = match block {
            ContentBlock::Heading { level, text } => {
                doc.push(Paragraph::with_text(ParagraphStyle::Heading(level.number()), text))
            }
            ContentBlock::Paragraph { text } => {
                doc.push(Paragraph::with_text(ParagraphStyle::Normal, text))
            }
            ContentBlock::ListItem { text, list_kind } => {
                let style = match list_kind {
                    ListKind::Bullet => ParagraphStyle::ListBullet,
                    ListKind::Numbered => ParagraphStyle::ListNumber,
                };
                doc.push(Paragraph::with_text(style, text))
            }
            ContentBlock::Link { text, href, .. } => {
                let idx = anchor.ok_or_else(|| RenderError::NoAnchorParagraph {
                    link_text: text.clone(),
                })?;
                doc.elements[idx].runs.push(link_run(text, href.as_deref()));
                idx
            }
        };
        anchor = Some(next);
    }

    Ok(doc)
}
