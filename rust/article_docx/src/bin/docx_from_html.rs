use anyhow::{anyhow, Context, Result};
use article_docx::write_article;
use clap::Parser;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input HTML file holding the article body.
    #[arg(long)]
    html_file: PathBuf,

    /// Output .docx path.
    #[arg(long)]
    out: PathBuf,

    /// Level-1 heading; defaults to the input file stem.
    #[arg(long)]
    title: Option<String>,

    /// Paragraph placed right under the title.
    #[arg(long, default_value = "")]
    definition: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut html = String::new();
    File::open(&args.html_file)
        .with_context(|| format!("open {}", args.html_file.display()))?
        .read_to_string(&mut html)
        .with_context(|| format!("read {}", args.html_file.display()))?;

    if html.trim().is_empty() {
        return Err(anyhow!("empty html"));
    }

    let title = args.title.unwrap_or_else(|| {
        args.html_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let warnings = write_article(&args.out, &title, &args.definition, &html)
        .with_context(|| format!("write {}", args.out.display()))?;
    tracing::info!(out = %args.out.display(), warnings = warnings.len(), "document written");
    Ok(())
}
