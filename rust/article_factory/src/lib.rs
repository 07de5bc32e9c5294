//! Batch article generation from a keyword spreadsheet.
//!
//! Each topic row gets its related links, a definition and an HTML article
//! from the generation service, and a `.docx` rendered by [`article_docx`].
//! The batch ends with an updated CSV and a zip of everything produced.

pub mod archive;
pub mod cancel;
pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod prompts;
pub mod rate_limit;
pub mod table;
pub mod topics;
pub mod url_path;

pub use cancel::CancellationToken;
pub use config::BatchConfig;
pub use error::{BatchError, Result};
pub use generation::{
    ApiKey, ChatCompletionClient, GenerationError, GenerationRequest, GenerationSettings,
    Generator,
};
pub use pipeline::{BatchPipeline, BatchReport, FailurePolicy, Stage, TopicFailure, TopicOutcome};
pub use rate_limit::{Clock, ManualClock, RateLimiter, SystemClock};
pub use table::{GeneratedText, TopicRow, TopicTable};
pub use topics::{RelatedLink, TopicGraph};
