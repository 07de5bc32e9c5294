use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A link block arrived before any heading, paragraph or list item.
    #[error("link {link_text:?} has no preceding paragraph to attach to")]
    NoAnchorParagraph { link_text: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("docx packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl RenderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
