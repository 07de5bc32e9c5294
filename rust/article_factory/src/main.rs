use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use article_factory::{
    ApiKey, BatchConfig, BatchPipeline, CancellationToken, ChatCompletionClient, FailurePolicy,
    RateLimiter, SystemClock, TopicTable,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Keyword table (CSV) with topic, keyword / h1 and category columns.
    csv: PathBuf,

    /// Directory that receives the batch folder and its zip.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// TOML file with batch settings.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    domain: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    presence_penalty: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    frequency_penalty: Option<f32>,

    /// 1-indexed column where the outline sections begin.
    #[arg(long)]
    section_start_column: Option<usize>,

    /// `abort` or `skip`.
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
}

impl Args {
    fn apply(&self, config: &mut BatchConfig) {
        if let Some(v) = &self.domain {
            config.domain = v.clone();
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = self.temperature {
            config.temperature = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.presence_penalty {
            config.presence_penalty = v;
        }
        if let Some(v) = self.frequency_penalty {
            config.frequency_penalty = v;
        }
        if let Some(v) = self.section_start_column {
            config.section_start_column = v;
        }
        if let Some(v) = self.failure_policy {
            config.failure_policy = v;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BatchConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => BatchConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if args.api_key.trim().is_empty() {
        bail!("empty API key");
    }

    let table = TopicTable::from_path(&args.csv, &config.domain, config.section_start_column)
        .with_context(|| format!("read {}", args.csv.display()))?;
    info!(topics = table.len(), "table loaded");

    let client = ChatCompletionClient::new(&config.api_base, config.request_timeout());
    let limiter = RateLimiter::new(SystemClock::new(), 1, config.request_interval());
    let settings = config.generation_settings(ApiKey::new(args.api_key.trim()));
    let cancel = CancellationToken::new();

    let report = BatchPipeline::new(&client, limiter, settings)
        .with_policy(config.failure_policy)
        .run(&table, &args.out, &cancel)?;

    for path in report.documents() {
        println!("{}", path.display());
    }
    for (topic, failure) in report.failures() {
        eprintln!("skipped {topic:?} at {}: {}", failure.stage, failure.message);
    }
    println!("{}", report.table_path.display());
    println!("{}", report.archive_path.display());
    Ok(())
}
