//! Keyword spreadsheet ingestion and the updated table written after a batch.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::error::{BatchError, Result};
use crate::url_path::{full_path, url_path};

pub const TOPIC_COLUMN: &str = "topic";
pub const KEYWORD_COLUMN: &str = "keyword / h1";
pub const CATEGORY_COLUMN: &str = "category";

/// One spreadsheet row with its derived paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRow {
    pub topic: String,
    pub h1_keyword: String,
    pub category: String,
    pub url_path: String,
    pub full_path: String,
    pub sections: Vec<String>,
}

impl TopicRow {
    pub fn new(
        topic: impl Into<String>,
        h1_keyword: impl Into<String>,
        category: impl Into<String>,
        domain: &str,
        sections: Vec<String>,
    ) -> Self {
        let h1_keyword = h1_keyword.into();
        let url_path = url_path(&h1_keyword);
        Self {
            topic: topic.into(),
            full_path: full_path(domain, &url_path),
            url_path,
            h1_keyword,
            category: category.into(),
            sections,
        }
    }
}

/// Text generated for one row; `None` in [`TopicTable::write_updated`] leaves
/// the cells empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    pub definition: String,
    pub article: String,
}

#[derive(Debug, Clone)]
pub struct TopicTable {
    headers: Vec<String>,
    cells: Vec<Vec<String>>,
    rows: Vec<TopicRow>,
}

fn column(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| BatchError::validation(format!("missing required column {name:?}")))
}

impl TopicTable {
    pub fn from_path(path: &Path, domain: &str, section_start_column: usize) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| BatchError::io(path, e))?;
        Self::from_reader(file, domain, section_start_column)
    }

    /// Reads a CSV with case-insensitive headers. Sections are the non-empty
    /// cells from `section_start_column` (1-indexed) to the last column.
    pub fn from_reader<R: io::Read>(
        reader: R,
        domain: &str,
        section_start_column: usize,
    ) -> Result<Self> {
        if section_start_column == 0 {
            return Err(BatchError::validation("section start column is 1-indexed"));
        }

        let mut input = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut headers: Vec<String> = input
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let topic_idx = column(&headers, TOPIC_COLUMN)?;
        let keyword_idx = column(&headers, KEYWORD_COLUMN)?;
        let category_idx = column(&headers, CATEGORY_COLUMN)?;

        let mut cells = Vec::new();
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        for (i, record) in input.records().enumerate() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() > headers.len() {
                warn!(row = i + 1, cells = row.len(), headers = headers.len(), "row is wider than the header");
            }
            row.resize(row.len().max(headers.len()), String::new());

            let required = |idx: usize, name: &str| -> Result<String> {
                let value = row[idx].trim();
                if value.is_empty() {
                    return Err(BatchError::validation(format!(
                        "row {}: empty {name:?}",
                        i + 1
                    )));
                }
                Ok(value.to_string())
            };
            let topic = required(topic_idx, TOPIC_COLUMN)?;
            let keyword = required(keyword_idx, KEYWORD_COLUMN)?;
            let category = required(category_idx, CATEGORY_COLUMN)?;

            let sections = row
                .iter()
                .skip(section_start_column - 1)
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();

            if !seen.insert(topic.clone()) {
                warn!(topic = %topic, "duplicate topic; related links use the first row");
            }
            rows.push(TopicRow::new(topic, keyword, category, domain, sections));
            cells.push(row);
        }

        if rows.is_empty() {
            return Err(BatchError::validation("table has no rows"));
        }

        // Cells past the header keep their position under blank headers.
        let width = cells.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
        headers.resize(width, String::new());
        for row in &mut cells {
            row.resize(width, String::new());
        }
        Ok(Self {
            headers,
            cells,
            rows,
        })
    }

    pub fn rows(&self) -> &[TopicRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Input columns followed by `url path`, `full path`, `definition` and
    /// `article`. `generated` is indexed like [`Self::rows`].
    pub fn write_updated<W: io::Write>(
        &self,
        writer: W,
        generated: &[Option<GeneratedText>],
    ) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = self.headers.clone();
        header.extend(["url path", "full path", "definition", "article"].map(String::from));
        out.write_record(&header)?;

        for (i, (cells, row)) in self.cells.iter().zip(&self.rows).enumerate() {
            let text = generated.get(i).and_then(Option::as_ref);
            let mut record = cells.clone();
            record.push(row.url_path.clone());
            record.push(row.full_path.clone());
            record.push(text.map(|t| t.definition.clone()).unwrap_or_default());
            record.push(text.map(|t| t.article.clone()).unwrap_or_default());
            out.write_record(&record)?;
        }
        out.flush().map_err(|e| BatchError::io("<csv output>", e))?;
        Ok(())
    }
}
