use crate::blocks::{ContentBlock, HeadingLevel, ListKind};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlEvent {
    StartTag { name: String, href: Option<String> },
    EndTag { name: String },
    Text(String),
}

/// Markup the flat parser tolerates but cannot represent faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// A list opened while another was still open; the inner one replaces it.
    NestedList { outer: ListKind, inner: ListKind },
    /// A `</ul>` or `</ol>` that does not match the tracked list.
    UnmatchedListClose { tag: String },
    LinkWithoutHref { text: String },
    NoContent,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedList { outer, inner } => write!(
                f,
                "<{}> opened inside <{}>; nesting is flattened",
                inner.tag(),
                outer.tag()
            ),
            Self::UnmatchedListClose { tag } => write!(f, "</{tag}> does not close the open list"),
            Self::LinkWithoutHref { text } => write!(f, "link {text:?} has no href"),
            Self::NoContent => write!(f, "no headings, paragraphs, list items or links found"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArticle {
    pub blocks: Vec<ContentBlock>,
    pub warnings: Vec<ParseWarning>,
}

/// Tag-driven state machine over start/end/text events.
///
/// Only one open list is tracked: a nested list overwrites the slot and the
/// first matching close clears it.
#[derive(Debug, Default)]
pub struct ContentBlockParser {
    current_tag: Option<String>,
    list_kind: Option<ListKind>,
    link_target: Option<String>,
    // Kind of the list item that trailing links continue.
    continued_list: Option<ListKind>,
    blocks: Vec<ContentBlock>,
    warnings: Vec<ParseWarning>,
}

impl ContentBlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, event: HtmlEvent) {
        match event {
            HtmlEvent::StartTag { name, href } => self.start_tag(&name, href.as_deref()),
            HtmlEvent::EndTag { name } => self.end_tag(&name),
            HtmlEvent::Text(data) => self.text(&data),
        }
    }

    pub fn start_tag(&mut self, name: &str, href: Option<&str>) {
        let tag = name.to_ascii_lowercase();
        if let Some(kind) = ListKind::from_tag(&tag) {
            if let Some(outer) = self.list_kind {
                self.warn(ParseWarning::NestedList { outer, inner: kind });
            }
            self.list_kind = Some(kind);
        }
        if tag == "a" {
            self.link_target = href.map(str::to_string);
        }
        self.current_tag = Some(tag);
    }

    pub fn end_tag(&mut self, name: &str) {
        let tag = name.to_ascii_lowercase();
        if ListKind::from_tag(&tag).is_some() {
            match self.list_kind {
                Some(kind) if kind.tag() == tag => self.list_kind = None,
                _ => self.warn(ParseWarning::UnmatchedListClose { tag: tag.clone() }),
            }
        }
        if tag == "a" {
            self.link_target = None;
        }
        self.current_tag = None;
    }

    pub fn text(&mut self, data: &str) {
        let Some(tag) = self.current_tag.as_deref() else {
            return;
        };
        let text = data.trim().to_string();

        let block = if let Some(level) = HeadingLevel::from_tag(tag) {
            ContentBlock::Heading { level, text }
        } else {
            match tag {
                "p" => ContentBlock::Paragraph { text },
                "li" => ContentBlock::ListItem {
                    text,
                    list_kind: self.list_kind.unwrap_or(ListKind::Bullet),
                },
                "a" => {
                    if self.link_target.is_none() {
                        self.warn(ParseWarning::LinkWithoutHref { text: text.clone() });
                    }
                    ContentBlock::Link {
                        text,
                        href: self.link_target.clone(),
                        enclosing_list_kind: self.list_kind.or(self.continued_list),
                    }
                }
                _ => return,
            }
        };
        self.push(block);
    }

    pub fn finish(mut self) -> ParsedArticle {
        if self.blocks.is_empty() {
            self.warn(ParseWarning::NoContent);
        }
        ParsedArticle {
            blocks: self.blocks,
            warnings: self.warnings,
        }
    }

    fn push(&mut self, block: ContentBlock) {
        match &block {
            ContentBlock::ListItem { list_kind, .. } => self.continued_list = Some(*list_kind),
            ContentBlock::Link { .. } => {}
            ContentBlock::Heading { .. } | ContentBlock::Paragraph { .. } => {
                self.continued_list = None
            }
        }
        self.blocks.push(block);
    }

    fn warn(&mut self, warning: ParseWarning) {
        tracing::warn!(%warning, "article markup");
        self.warnings.push(warning);
    }
}

fn html5_parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

fn tag_lower(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

fn attr_get(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.to_string().eq_ignore_ascii_case(name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn body_children(dom: &RcDom) -> Vec<Handle> {
    fn walk_find_body(node: &Handle, out: &mut Vec<Handle>) -> bool {
        if tag_lower(node).as_deref() == Some("body") {
            out.extend(node.children.borrow().iter().cloned());
            return true;
        }
        for c in node.children.borrow().iter() {
            if walk_find_body(c, out) {
                return true;
            }
        }
        false
    }

    let mut out = Vec::new();
    if !walk_find_body(&dom.document, &mut out) {
        out = dom.document.children.borrow().iter().cloned().collect();
    }
    out
}

/// Walks the fragment in document order and hands every start tag, text
/// node and end tag to `sink`.
pub fn for_each_event(input_html: &str, mut sink: impl FnMut(HtmlEvent)) {
    let wrapped = if input_html.to_ascii_lowercase().contains("<html") {
        input_html.to_string()
    } else {
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>{}</body></html>",
            input_html
        )
    };
    let dom = html5_parse(&wrapped);

    fn walk(node: &Handle, sink: &mut dyn FnMut(HtmlEvent)) {
        match &node.data {
            NodeData::Text { contents } => sink(HtmlEvent::Text(contents.borrow().to_string())),
            NodeData::Element { .. } => {
                let Some(tag) = tag_lower(node) else { return };
                let href = if tag == "a" { attr_get(node, "href") } else { None };
                sink(HtmlEvent::StartTag {
                    name: tag.clone(),
                    href,
                });
                for c in node.children.borrow().iter() {
                    walk(c, sink);
                }
                sink(HtmlEvent::EndTag { name: tag });
            }
            _ => {}
        }
    }

    for node in body_children(&dom) {
        walk(&node, &mut sink);
    }
}

pub fn parse_article(html: &str) -> ParsedArticle {
    let mut parser = ContentBlockParser::new();
    for_each_event(html, |event| parser.feed(event));
    parser.finish()
}
