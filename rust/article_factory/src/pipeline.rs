//! Sequential batch: related links → definition → article → parse → render.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use article_docx::{docx, parse_article, render};

use crate::archive;
use crate::cancel::CancellationToken;
use crate::error::{BatchError, Result};
use crate::generation::{GenerationSettings, Generator};
use crate::prompts::{article_prompt, definition_prompt, SYSTEM_MESSAGE};
use crate::rate_limit::{Clock, RateLimiter};
use crate::table::{GeneratedText, TopicRow, TopicTable};
use crate::topics::TopicGraph;

/// What to do when one topic fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch at the first failing topic.
    #[default]
    Abort,
    /// Record the failure and move on to the next topic.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown failure policy {other:?} (expected abort or skip)")),
        }
    }
}

/// Where a topic failed. Parsing only warns, so it has no stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RelatedLinks,
    Definition,
    Article,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RelatedLinks => "related_links",
            Self::Definition => "definition",
            Self::Article => "article",
            Self::Render => "render",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFailure {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug)]
pub struct TopicOutcome {
    pub topic: String,
    pub result: std::result::Result<PathBuf, TopicFailure>,
    /// Markup problems the parser tolerated.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub batch_dir: PathBuf,
    pub table_path: PathBuf,
    pub archive_path: PathBuf,
    pub outcomes: Vec<TopicOutcome>,
}

impl BatchReport {
    pub fn documents(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(PathBuf::as_path))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TopicFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|f| (o.topic.as_str(), f)))
    }
}

struct StageFailure {
    stage: Stage,
    error: BatchError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T, E: Into<BatchError>> AtStage<T> for std::result::Result<T, E> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

struct Produced {
    path: PathBuf,
    text: GeneratedText,
    warnings: Vec<String>,
}

/// `<topic with spaces replaced by _>_article.docx`
pub fn document_file_name(topic: &str) -> String {
    format!("{}_article.docx", topic.replace(' ', "_"))
}

pub fn batch_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

pub struct BatchPipeline<'g, G: Generator, C: Clock> {
    generator: &'g G,
    limiter: RateLimiter<C>,
    settings: GenerationSettings,
    policy: FailurePolicy,
    timestamp: Option<String>,
}

impl<'g, G: Generator, C: Clock> BatchPipeline<'g, G, C> {
    pub fn new(generator: &'g G, limiter: RateLimiter<C>, settings: GenerationSettings) -> Self {
        Self {
            generator,
            limiter,
            settings,
            policy: FailurePolicy::default(),
            timestamp: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fixes the `article_batch_<timestamp>` name instead of using local time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }

    #[instrument(skip_all, fields(topics = table.len(), out = %out_root.display()))]
    pub fn run(
        &mut self,
        table: &TopicTable,
        out_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let stamp = self.timestamp.clone().unwrap_or_else(batch_timestamp);
        let batch_name = format!("article_batch_{stamp}");
        let batch_dir = out_root.join(&batch_name);
        fs::create_dir_all(&batch_dir).map_err(|e| BatchError::io(&batch_dir, e))?;

        let graph = TopicGraph::new(table.rows());
        let mut generated = Vec::with_capacity(table.len());
        let mut outcomes = Vec::with_capacity(table.len());
        // file name -> topic that wrote it
        let mut written: HashMap<String, String> = HashMap::new();

        for (idx, row) in table.rows().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }
            info!(topic = %row.topic, n = idx + 1, of = table.len(), "generating");

            match self.process_topic(&graph, row, &batch_dir, &mut written, cancel) {
                Ok(produced) => {
                    outcomes.push(TopicOutcome {
                        topic: row.topic.clone(),
                        result: Ok(produced.path),
                        warnings: produced.warnings,
                    });
                    generated.push(Some(produced.text));
                }
                Err(StageFailure {
                    error: BatchError::Cancelled,
                    ..
                }) => {
                    return Err(BatchError::Cancelled);
                }
                Err(StageFailure { stage, error }) => match self.policy {
                    FailurePolicy::Abort => {
                        return Err(BatchError::TopicFailed {
                            topic: row.topic.clone(),
                            stage,
                            source: Box::new(error),
                        });
                    }
                    FailurePolicy::Skip => {
                        warn!(topic = %row.topic, %stage, error = %error, "topic skipped");
                        outcomes.push(TopicOutcome {
                            topic: row.topic.clone(),
                            result: Err(TopicFailure {
                                stage,
                                message: error.to_string(),
                            }),
                            warnings: Vec::new(),
                        });
                        generated.push(None);
                    }
                },
            }
        }

        let table_path = batch_dir.join(format!("{batch_name}.csv"));
        let file = fs::File::create(&table_path).map_err(|e| BatchError::io(&table_path, e))?;
        table.write_updated(file, &generated)?;

        let archive_path = out_root.join(format!("{batch_name}.zip"));
        let packed = archive::package_dir(&batch_dir, &archive_path)?;
        info!(archive = %archive_path.display(), files = packed.len(), "batch packaged");

        Ok(BatchReport {
            batch_dir,
            table_path,
            archive_path,
            outcomes,
        })
    }

    fn call(
        &mut self,
        prompt: String,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, BatchError> {
        self.limiter.acquire(cancel)?;
        let request = self.settings.request(SYSTEM_MESSAGE, prompt);
        Ok(self.generator.generate(&self.settings.api_key, &request)?)
    }

    fn process_topic(
        &mut self,
        graph: &TopicGraph<'_>,
        row: &TopicRow,
        batch_dir: &Path,
        written: &mut HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Produced, StageFailure> {
        let links = graph.related_links(&row.topic).at(Stage::RelatedLinks)?;

        let definition = self
            .call(definition_prompt(&row.topic), cancel)
            .at(Stage::Definition)?;
        let article = self
            .call(article_prompt(&row.topic, &row.sections, &links), cancel)
            .at(Stage::Article)?;

        let parsed = parse_article(&article);
        let doc = render(&row.h1_keyword, &definition, &parsed.blocks).at(Stage::Render)?;
        let file_name = document_file_name(&row.topic);
        if let Some(first_topic) = written.get(&file_name) {
            return Err(StageFailure {
                stage: Stage::Render,
                error: BatchError::DuplicateDocument {
                    file_name,
                    first_topic: first_topic.clone(),
                },
            });
        }
        let path = batch_dir.join(&file_name);
        docx::save(&doc, &path).at(Stage::Render)?;
        written.insert(file_name, row.topic.clone());

        Ok(Produced {
            path,
            text: GeneratedText {
                definition,
                article,
            },
            warnings: parsed.warnings.iter().map(ToString::to_string).collect(),
        })
    }
}
