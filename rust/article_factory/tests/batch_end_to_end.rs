use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

use article_factory::{
    ApiKey, BatchError, BatchPipeline, CancellationToken, Clock, FailurePolicy, GenerationError,
    GenerationRequest, GenerationSettings, Generator, ManualClock, RateLimiter, Stage, TopicTable,
};

const CSV: &str = "\
Topic,Keyword / H1,Category,Volume,Intent,Notes,Section 1,Section 2
Backlinks,What Are Backlinks,SEO,100,info,,Intro,Why they matter
Keyword Research,Keyword Research Basics,SEO,80,info,,Intro,Tools
";

const ARTICLE_HTML: &str = "<h2>Intro</h2><p>Links from other sites.</p>\
<ul><li>Quality first</li></ul><p><a href=\"https://example.com/keyword-research-basics\">keyword research</a></p>";

/// Answers definition and article prompts with fixed text, optionally
/// failing the article call for one topic or replacing its article.
struct ScriptedGenerator {
    fail_article_for: Option<&'static str>,
    article_for: Option<(&'static str, &'static str)>,
    requests: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(fail_article_for: Option<&'static str>) -> Self {
        Self {
            fail_article_for,
            article_for: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    fn with_article(mut self, topic: &'static str, html: &'static str) -> Self {
        self.article_for = Some((topic, html));
        self
    }

    fn article_prompts(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.prompt.starts_with("Please write"))
            .map(|r| r.prompt.clone())
            .collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(
        &self,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        assert_eq!(api_key.expose(), "sk-test");
        self.requests.borrow_mut().push(request.clone());
        if request.prompt.starts_with("Please write") {
            if let Some(topic) = self.fail_article_for {
                if request.prompt.contains(&format!("'{topic}'")) {
                    return Err(GenerationError::Status {
                        code: 500,
                        body: "upstream error".to_string(),
                    });
                }
            }
            if let Some((topic, html)) = self.article_for {
                if request.prompt.contains(&format!("'{topic}'")) {
                    return Ok(html.to_string());
                }
            }
            Ok(ARTICLE_HTML.to_string())
        } else {
            Ok("A short definition.".to_string())
        }
    }
}

fn settings() -> GenerationSettings {
    GenerationSettings {
        api_key: ApiKey::new("sk-test"),
        model: "gpt-3.5-turbo".to_string(),
        max_tokens: 2048,
        temperature: 0.7,
        presence_penalty: 0.2,
        frequency_penalty: 0.2,
    }
}

fn table() -> TopicTable {
    TopicTable::from_reader(CSV.as_bytes(), "example.com", 7).unwrap()
}

fn docx_part(path: &std::path::Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut part = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut part).unwrap();
    part
}

fn read_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[headers.len() - 2], "definition");
    assert_eq!(&headers[headers.len() - 1], "article");
    reader.records().map(Result::unwrap).collect()
}

#[test]
fn batch_writes_documents_table_and_archive() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None);
    let limiter = RateLimiter::new(&clock, 1, Duration::from_secs(7));
    let mut pipeline =
        BatchPipeline::new(&generator, limiter, settings()).with_timestamp("2024-01-02_03-04-05");

    let report = pipeline
        .run(&table(), out.path(), &CancellationToken::new())
        .unwrap();

    let batch_dir = out.path().join("article_batch_2024-01-02_03-04-05");
    assert_eq!(report.batch_dir, batch_dir);
    assert!(batch_dir.join("Backlinks_article.docx").is_file());
    assert!(batch_dir.join("Keyword_Research_article.docx").is_file());
    assert_eq!(report.documents().count(), 2);
    assert_eq!(report.failures().count(), 0);

    let docx = batch_dir.join("Backlinks_article.docx");
    let rels = docx_part(&docx, "word/_rels/document.xml.rels");
    assert!(
        rels.contains(r#"Target="https://example.com/keyword-research-basics" TargetMode="External""#),
        "{rels}"
    );
    let body = docx_part(&docx, "word/document.xml");
    assert!(body.contains("<w:hyperlink"), "{body}");
    assert!(body.contains("keyword research"), "{body}");

    let archive = zip::ZipArchive::new(File::open(&report.archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 3);
    assert!(archive.file_names().any(|n| n == "Keyword_Research_article.docx"));

    let rows = read_rows(&report.table_path);
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(&row[row.len() - 2], "A short definition.");
        assert_eq!(&row[row.len() - 1], ARTICLE_HTML);
    }

    let prompts = generator.article_prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].matches("Keyword Research (https://example.com/keyword-research-basics)").count(), 1);
    assert_eq!(prompts[1].matches("Backlinks (https://example.com/what-are-backlinks)").count(), 1);
    assert!(!prompts[0].contains("Backlinks ("));

    // four calls spaced seven seconds apart
    assert_eq!(generator.requests.borrow().len(), 4);
    assert_eq!(clock.now(), Duration::from_secs(21));
}

#[test]
fn skip_policy_records_failure_and_continues() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(Some("Backlinks"));
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_policy(FailurePolicy::Skip)
        .with_timestamp("skip");

    let report = pipeline
        .run(&table(), out.path(), &CancellationToken::new())
        .unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "Backlinks");
    assert_eq!(failures[0].1.stage, Stage::Article);
    assert_eq!(report.documents().count(), 1);
    assert!(!report.batch_dir.join("Backlinks_article.docx").exists());

    let rows = read_rows(&report.table_path);
    assert_eq!(&rows[0][rows[0].len() - 1], "");
    assert_eq!(&rows[1][rows[1].len() - 1], ARTICLE_HTML);
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(Some("Backlinks"));
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_timestamp("abort");

    let err = pipeline
        .run(&table(), out.path(), &CancellationToken::new())
        .unwrap_err();

    match err {
        BatchError::TopicFailed { topic, stage, .. } => {
            assert_eq!(topic, "Backlinks");
            assert_eq!(stage, Stage::Article);
        }
        other => panic!("unexpected error: {other}"),
    }
    // definition + failed article for the first topic only
    assert_eq!(generator.requests.borrow().len(), 2);
    assert!(!out.path().join("abort.zip").exists());
}

#[test]
fn cancelled_batch_makes_no_calls() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None);
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.run(&table(), out.path(), &cancel).unwrap_err();
    assert!(matches!(err, BatchError::Cancelled));
    assert!(generator.requests.borrow().is_empty());
}

#[test]
fn lone_topic_without_outline_still_generates() {
    let csv = "topic,keyword / h1,category\nSEO,What Is SEO,Search\n";
    let table = TopicTable::from_reader(csv.as_bytes(), "example.com", 7).unwrap();
    assert!(table.rows()[0].sections.is_empty());

    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None);
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_timestamp("lone");

    let report = pipeline
        .run(&table, out.path(), &CancellationToken::new())
        .unwrap();
    assert_eq!(report.documents().count(), 1);

    let prompts = generator.article_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("related links"));
}

#[test]
fn article_opening_with_a_link_fails_at_render() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None)
        .with_article("Backlinks", "<a href=\"/x\">lead</a><p>body</p>");
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_policy(FailurePolicy::Skip)
        .with_timestamp("render");

    let report = pipeline
        .run(&table(), out.path(), &CancellationToken::new())
        .unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "Backlinks");
    assert_eq!(failures[0].1.stage, Stage::Render);
    assert!(failures[0].1.message.contains("lead"), "{}", failures[0].1.message);
    assert_eq!(report.documents().count(), 1);
}

const COLLIDING_CSV: &str = "\
topic,keyword / h1,category
A B,First Keyword,Search
A_B,Second Keyword,Search
";

#[test]
fn colliding_document_names_do_not_overwrite() {
    let table = TopicTable::from_reader(COLLIDING_CSV.as_bytes(), "example.com", 7).unwrap();
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None);
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_policy(FailurePolicy::Skip)
        .with_timestamp("collide");

    let report = pipeline
        .run(&table, out.path(), &CancellationToken::new())
        .unwrap();

    let documents: Vec<_> = report.documents().collect();
    assert_eq!(documents.len(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "A_B");
    assert_eq!(failures[0].1.stage, Stage::Render);

    // the surviving document still belongs to the first topic
    let body = docx_part(documents[0], "word/document.xml");
    assert!(body.contains("First Keyword"), "{body}");

    let archive = zip::ZipArchive::new(File::open(&report.archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
}

#[test]
fn colliding_document_names_abort_by_default() {
    let table = TopicTable::from_reader(COLLIDING_CSV.as_bytes(), "example.com", 7).unwrap();
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let generator = ScriptedGenerator::new(None);
    let mut pipeline = BatchPipeline::new(&generator, RateLimiter::unlimited(&clock), settings())
        .with_timestamp("collide");

    let err = pipeline
        .run(&table, out.path(), &CancellationToken::new())
        .unwrap_err();
    match err {
        BatchError::TopicFailed { topic, stage, source } => {
            assert_eq!(topic, "A_B");
            assert_eq!(stage, Stage::Render);
            assert!(matches!(
                *source,
                BatchError::DuplicateDocument { ref first_topic, .. } if first_topic == "A B"
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}
