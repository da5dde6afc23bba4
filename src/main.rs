use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use grounded_docs::config::{self, ConfigError, GenerationConfig, PipelineConfig, ProviderKind};
use grounded_docs::extract::{file_type_of, PlainTextExtractor, TextExtractor};
use grounded_docs::init::InitCell;
use grounded_docs::pipeline::compose::{RefinementAnswer, UserProfile};
use grounded_docs::pipeline::sources::{ReferenceLookup, UploadedDoc, WikipediaLookup};
use grounded_docs::{DocumentRequest, GroundedDocumentPipeline, PipelineError};

/// Reference lookups give up after this long.
const LOOKUP_TIMEOUT_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "grounded-docs")]
#[command(about = "Write a citation-backed document from a request and optional uploads", long_about = None)]
#[command(version)]
struct Cli {
    /// What the document should cover
    #[arg(short, long)]
    query: String,

    /// Plain-text or Markdown file to ground the document in (repeatable)
    #[arg(short, long = "upload")]
    uploads: Vec<PathBuf>,

    /// Target length: short, medium, long, very long, or a page range like 10-20
    #[arg(short, long)]
    length: Option<String>,

    /// Clarification as "question=answer" (repeatable)
    #[arg(short, long = "answer", value_parser = parse_answer)]
    answers: Vec<RefinementAnswer>,

    /// Skip encyclopedia lookups and use uploads only
    #[arg(long)]
    no_external: bool,

    /// Generation backend (ollama, anthropic, mock); overrides GROUNDED_PROVIDER
    #[arg(long)]
    provider: Option<ProviderKind>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    role: Option<String>,

    #[arg(long)]
    organization: Option<String>,

    #[arg(long)]
    profession: Option<String>,

    /// Field the document belongs to
    #[arg(long)]
    domain: Option<String>,

    /// Level of expertise on the subject
    #[arg(long)]
    expertise: Option<String>,

    #[arg(long)]
    education: Option<String>,

    #[arg(long)]
    age: Option<String>,

    /// What the document will be used for
    #[arg(long)]
    objective: Option<String>,

    #[arg(long)]
    tone: Option<String>,
}

fn parse_answer(raw: &str) -> Result<RefinementAnswer, String> {
    let (question, answer) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected \"question=answer\", got \"{raw}\""))?;
    Ok(RefinementAnswer {
        question: question.trim().to_string(),
        answer: answer.trim().to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Init(#[from] grounded_docs::init::InitError),

    #[error("Could not read {path}: {source}")]
    Upload {
        path: String,
        source: grounded_docs::extract::ExtractError,
    },

    #[error("Could not serialize result: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "Request failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether a document was produced.
async fn run(cli: Cli) -> Result<bool, CliError> {
    let pipeline_config = PipelineConfig::from_env()?;
    let mut generation = GenerationConfig::from_env()?;
    if let Some(provider) = cli.provider {
        generation.provider = provider;
    }

    let cell: InitCell<GroundedDocumentPipeline> = InitCell::new();
    let pipeline = cell
        .get_or_init(|| async {
            let lookup: Option<Arc<dyn ReferenceLookup>> = if cli.no_external {
                None
            } else {
                Some(Arc::new(
                    WikipediaLookup::new(&pipeline_config.reference_language, LOOKUP_TIMEOUT_SECS)
                        .map_err(|e| PipelineError::Configuration(e.to_string()))?,
                ))
            };
            GroundedDocumentPipeline::from_config(pipeline_config.clone(), &generation, lookup)
        })
        .await?;

    let mut uploaded = Vec::with_capacity(cli.uploads.len());
    for path in &cli.uploads {
        let extracted = PlainTextExtractor
            .extract(path, &file_type_of(path))
            .await
            .map_err(|source| CliError::Upload {
                path: path.display().to_string(),
                source,
            })?;
        uploaded.push(UploadedDoc {
            id: Uuid::new_v4().to_string(),
            filename: extracted.metadata.filename,
            extracted_text: extracted.text,
        });
    }

    let request = DocumentRequest {
        query: cli.query,
        profile: UserProfile {
            name: cli.name,
            role: cli.role,
            organization: cli.organization,
            profession: cli.profession,
            domain: cli.domain,
            expertise: cli.expertise,
            education: cli.education,
            age: cli.age,
            objective: cli.objective,
            tone: cli.tone,
        },
        answers: cli.answers,
        uploaded,
        length: cli.length,
    };

    let result = pipeline.run(&request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}
