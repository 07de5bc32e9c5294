// WordprocessingML packaging for a rendered article.

use crate::error::RenderError;
use crate::render::{Paragraph, ParagraphStyle, RenderedDocument, Run};
use std::collections::BTreeMap;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const BULLET_NUM_ID: u32 = 1;
const FIRST_NUMBERED_NUM_ID: u32 = 2;
const FIRST_LINK_RID: u32 = 10;

fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn run_xml(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!(
        "<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>",
        xml_escape_text(text)
    )
}

fn hyperlink_run_xml(text: &str) -> String {
    format!(
        concat!(
            "<w:r><w:rPr><w:rStyle w:val=\"Hyperlink\"/>",
            "<w:color w:val=\"0563C1\" w:themeColor=\"hyperlink\"/><w:u w:val=\"single\"/></w:rPr>",
            "<w:t xml:space=\"preserve\">{}</w:t></w:r>"
        ),
        xml_escape_text(text)
    )
}

fn style_id(style: ParagraphStyle) -> Option<String> {
    match style {
        ParagraphStyle::Normal => None,
        ParagraphStyle::Heading(level) => Some(format!("Heading{}", level.clamp(1, 4))),
        ParagraphStyle::ListBullet => Some("ListBullet".to_string()),
        ParagraphStyle::ListNumber => Some("ListNumber".to_string()),
    }
}

fn paragraph_xml(p: &Paragraph, num_id: Option<u32>, link_to_rid: &BTreeMap<&str, String>) -> String {
    let mut out = String::new();
    out.push_str("<w:p>");

    if let Some(id) = style_id(p.style) {
        out.push_str("<w:pPr>");
        out.push_str(&format!("<w:pStyle w:val=\"{id}\"/>"));
        if let Some(num_id) = num_id {
            out.push_str("<w:numPr><w:ilvl w:val=\"0\"/>");
            out.push_str(&format!("<w:numId w:val=\"{num_id}\"/>"));
            out.push_str("</w:numPr>");
        }
        out.push_str("</w:pPr>");
    }

    for run in &p.runs {
        match run {
            Run::Text(text) => out.push_str(&run_xml(text)),
            Run::Hyperlink { text, .. } if text.is_empty() => {}
            Run::Hyperlink { text, href } => match link_to_rid.get(href.as_str()) {
                Some(rid) => {
                    out.push_str(&format!("<w:hyperlink r:id=\"{rid}\" w:history=\"1\">"));
                    out.push_str(&hyperlink_run_xml(text));
                    out.push_str("</w:hyperlink>");
                }
                None => out.push_str(&run_xml(text)),
            },
        }
    }

    out.push_str("</w:p>");
    out
}

/// Numbering instance per paragraph. Bullets share one instance; every
/// contiguous run of numbered items gets its own so each list restarts at 1.
fn assign_num_ids(doc: &RenderedDocument) -> (Vec<Option<u32>>, u32) {
    let mut ids = Vec::with_capacity(doc.elements.len());
    let mut next_numbered = FIRST_NUMBERED_NUM_ID;
    let mut numbered_lists = 0;
    let mut in_numbered = false;
    for p in &doc.elements {
        let id = match p.style {
            ParagraphStyle::ListBullet => Some(BULLET_NUM_ID),
            ParagraphStyle::ListNumber => {
                if !in_numbered {
                    if numbered_lists > 0 {
                        next_numbered += 1;
                    }
                    numbered_lists += 1;
                }
                Some(next_numbered)
            }
            _ => None,
        };
        in_numbered = p.style == ParagraphStyle::ListNumber;
        ids.push(id);
    }
    (ids, numbered_lists)
}

fn document_xml(doc: &RenderedDocument, num_ids: &[Option<u32>], link_to_rid: &BTreeMap<&str, String>) -> String {
    let mut body = String::new();
    for (p, num_id) in doc.elements.iter().zip(num_ids) {
        body.push_str(&paragraph_xml(p, *num_id, link_to_rid));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    {body}
    <w:sectPr>
      <w:pgSz w:w="12240" w:h="15840"/>
      <w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>
      <w:cols w:space="708"/>
    </w:sectPr>
  </w:body>
</w:document>"#
    )
}

fn content_types_xml(has_numbering: bool) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push('\n');
    out.push_str(
        r#"  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    );
    out.push('\n');
    out.push_str(r#"  <Default Extension="xml" ContentType="application/xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#);
    out.push('\n');
    if has_numbering {
        out.push_str(r#"  <Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>"#);
        out.push('\n');
    }
    out.push_str("</Types>");
    out
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
}

fn document_rels_xml(link_to_rid: &BTreeMap<&str, String>, has_numbering: bool) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    out.push('\n');
    out.push_str(r#"  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#);
    out.push('\n');
    if has_numbering {
        out.push_str(r#"  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>"#);
        out.push('\n');
    }
    for (href, rid) in link_to_rid {
        out.push_str(&format!(
            r#"  <Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="{href}" TargetMode="External"/>"#,
            href = xml_escape_text(href),
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn heading_style_xml(level: u8, before: u32, size: u32) -> String {
    format!(
        r#"  <w:style w:type="paragraph" w:styleId="Heading{level}">
    <w:name w:val="heading {level}"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="{before}" w:after="120"/>
      <w:outlineLvl w:val="{outline}"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="{size}"/>
    </w:rPr>
  </w:style>
"#,
        outline = level - 1,
    )
}

fn styles_xml() -> String {
    let mut out = String::new();
    out.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
"#,
    );
    for (level, before, size) in [(1, 480, 32), (2, 360, 28), (3, 240, 26), (4, 240, 24)] {
        out.push_str(&heading_style_xml(level, before, size));
    }
    out.push_str(
        r#"  <w:style w:type="paragraph" w:styleId="ListBullet">
    <w:name w:val="List Bullet"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr>
      <w:numPr><w:numId w:val="1"/></w:numPr>
      <w:ind w:left="720" w:hanging="360"/>
    </w:pPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="ListNumber">
    <w:name w:val="List Number"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr>
      <w:ind w:left="720" w:hanging="360"/>
    </w:pPr>
  </w:style>
  <w:style w:type="character" w:styleId="Hyperlink">
    <w:name w:val="Hyperlink"/>
    <w:uiPriority w:val="99"/>
    <w:rPr>
      <w:color w:val="0563C1" w:themeColor="hyperlink"/>
      <w:u w:val="single"/>
    </w:rPr>
  </w:style>
</w:styles>"#,
    );
    out
}

fn numbering_xml(numbered_lists: u32) -> String {
    let mut out = String::new();
    out.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="1">
    <w:multiLevelType w:val="hybridMultilevel"/>
    <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:lvlJc w:val="left"/></w:lvl>
  </w:abstractNum>
  <w:abstractNum w:abstractNumId="2">
    <w:multiLevelType w:val="hybridMultilevel"/>
    <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:lvlJc w:val="left"/></w:lvl>
  </w:abstractNum>
  <w:num w:numId="1"><w:abstractNumId w:val="1"/></w:num>
"#,
    );
    for i in 0..numbered_lists {
        let num_id = FIRST_NUMBERED_NUM_ID + i;
        out.push_str(&format!(
            "  <w:num w:numId=\"{num_id}\"><w:abstractNumId w:val=\"2\"/><w:lvlOverride w:ilvl=\"0\"><w:startOverride w:val=\"1\"/></w:lvlOverride></w:num>\n"
        ));
    }
    out.push_str("</w:numbering>");
    out
}

fn write_parts<W: Write + Seek>(writer: W, doc: &RenderedDocument) -> ZipResult<W> {
    let mut link_to_rid = BTreeMap::new();
    for (i, href) in doc.hrefs().into_iter().enumerate() {
        link_to_rid.insert(href, format!("rId{}", FIRST_LINK_RID + i as u32));
    }
    let has_numbering = doc.needs_numbering();
    let (num_ids, numbered_lists) = assign_num_ids(doc);

    let mut zip = ZipWriter::new(writer);
    let opts = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(content_types_xml(has_numbering).as_bytes())?;

    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("word/document.xml", opts)?;
    zip.write_all(document_xml(doc, &num_ids, &link_to_rid).as_bytes())?;

    zip.start_file("word/styles.xml", opts)?;
    zip.write_all(styles_xml().as_bytes())?;

    if has_numbering {
        zip.start_file("word/numbering.xml", opts)?;
        zip.write_all(numbering_xml(numbered_lists).as_bytes())?;
    }

    zip.start_file("word/_rels/document.xml.rels", opts)?;
    zip.write_all(document_rels_xml(&link_to_rid, has_numbering).as_bytes())?;

    zip.finish()
}

pub fn to_bytes(doc: &RenderedDocument) -> Result<Vec<u8>, RenderError> {
    let cursor = write_parts(Cursor::new(Vec::new()), doc)?;
    Ok(cursor.into_inner())
}

/// Writes the package next to `path` under a temporary name and renames it
/// into place, so a failed write never leaves a truncated file at `path`.
pub fn save(doc: &RenderedDocument, path: &Path) -> Result<(), RenderError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".article-")
        .suffix(".docx.part")
        .tempfile_in(dir)
        .map_err(|e| RenderError::io(dir, e))?;

    write_parts(tmp.as_file(), doc)?;
    tmp.as_file().sync_all().map_err(|e| RenderError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RenderError::io(path, e.error))?;
    Ok(())
}
