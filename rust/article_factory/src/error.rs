//! Error types for batch generation.

use std::path::PathBuf;

use article_docx::RenderError;

use crate::generation::GenerationError;
use crate::pipeline::Stage;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Missing column, empty mandatory cell, or otherwise unusable input.
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("topic {topic:?} is not in the table")]
    NotFound { topic: String },

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Two topics map to one document file name.
    #[error("document {file_name:?} was already written for topic {first_topic:?}")]
    DuplicateDocument {
        file_name: String,
        first_topic: String,
    },

    /// A topic failed under the abort policy.
    #[error("topic {topic:?} failed during {stage}: {source}")]
    TopicFailed {
        topic: String,
        stage: Stage,
        #[source]
        source: Box<BatchError>,
    },

    #[error("batch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BatchError>;

impl BatchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
