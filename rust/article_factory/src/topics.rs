// Related-topic lookup over the topic table.

use serde::Serialize;

use crate::error::{BatchError, Result};
use crate::table::TopicRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedLink {
    pub topic: String,
    pub full_path: String,
}

/// Borrowed view that links each topic to its category siblings.
#[derive(Debug, Clone, Copy)]
pub struct TopicGraph<'a> {
    rows: &'a [TopicRow],
}

impl<'a> TopicGraph<'a> {
    pub fn new(rows: &'a [TopicRow]) -> Self {
        Self { rows }
    }

    /// Rows sharing `topic`'s category, minus any row with its full path, in
    /// table order. When the topic appears more than once the first row wins.
    pub fn related_links(&self, topic: &str) -> Result<Vec<RelatedLink>> {
        let source = self
            .rows
            .iter()
            .find(|r| r.topic == topic)
            .ok_or_else(|| BatchError::NotFound {
                topic: topic.to_string(),
            })?;

        Ok(self
            .rows
            .iter()
            .filter(|r| r.category == source.category && r.full_path != source.full_path)
            .map(|r| RelatedLink {
                topic: r.topic.clone(),
                full_path: r.full_path.clone(),
            })
            .collect())
    }
}
