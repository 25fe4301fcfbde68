//! KeyTube command line
//!
//! Thin front end over the library: trending keywords from a title list,
//! SEO reports, free-form prompts and thumbnail regeneration through the
//! multi-key Gemini failover invoker.

use clap::{Args as ClapArgs, Parser, Subcommand};
use keytube::{
    config::{settings::parse_key_list, LogFormat, Settings},
    error::AppError,
    services::{
        gemini::decode_data_url, CredentialPool, CursorStore, FailoverInvoker, FileCursorStore,
        analysis_request, GeminiClient, GenerateText, RecreateThumbnail, ReportLanguage,
        TextRequest, ThumbnailRequest, VideoDetails,
    },
    trends::{extract_keywords_with, KeywordOptions, Language},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// KeyTube
///
/// YouTube SEO helper backed by a pool of Gemini API keys.
#[derive(Parser, Debug)]
#[command(name = "keytube")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Comma-separated Gemini API keys (overrides GEMINI_API_KEYS env var)
    #[arg(long, global = true)]
    keys: Option<String>,

    /// File holding the last working key index (overrides KEY_CURSOR_PATH env var)
    #[arg(long, global = true)]
    cursor_path: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (overrides LOG_FORMAT env var)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Also rotate keys rejected as invalid (overrides ROTATE_ON_INVALID_KEY env var)
    #[arg(long, global = true)]
    rotate_on_invalid_key: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract trending keywords from titles, one per line
    Trends(TrendsArgs),

    /// Write an SEO analysis report for a video
    Analyze(AnalyzeArgs),

    /// Generate text from a free-form prompt
    Generate(GenerateArgs),

    /// Regenerate a thumbnail from a source image and an instruction
    Thumbnail(ThumbnailArgs),

    /// Show the configured key pool
    Keys,
}

#[derive(ClapArgs, Debug)]
struct TrendsArgs {
    /// Title language
    #[arg(long, conflicts_with = "region")]
    lang: Option<Language>,

    /// Region code the titles were fetched for (VN selects Vietnamese)
    #[arg(long)]
    region: Option<String>,

    /// Maximum number of keywords
    #[arg(long, default_value_t = 15)]
    top: usize,

    /// Minimum occurrences across all titles
    #[arg(long, default_value_t = 2)]
    min: usize,

    /// Title file; reads stdin when omitted
    file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct AnalyzeArgs {
    /// JSON file with the video details (videoId, title, channelTitle, ...)
    details: PathBuf,

    /// Report language
    #[arg(long, value_enum, default_value_t = ReportLanguage::Vi)]
    lang: ReportLanguage,

    /// Model name (overrides GEMINI_TEXT_MODEL env var)
    #[arg(long)]
    model: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct GenerateArgs {
    /// Prompt text
    #[arg(long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Model name (overrides GEMINI_TEXT_MODEL env var)
    #[arg(long)]
    model: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ThumbnailArgs {
    /// URL of the source thumbnail
    #[arg(long)]
    image_url: String,

    /// Instruction describing the new thumbnail
    #[arg(long)]
    prompt: String,

    /// Output PNG path
    #[arg(long)]
    out: PathBuf,

    /// Model name (overrides GEMINI_IMAGE_MODEL env var)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(78);
        }
    };

    init_tracing(&settings.log_level, settings.log_format);

    tracing::debug!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        key_count = settings.gemini.api_keys.len(),
        "Starting keytube"
    );

    match run(args.command, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            if e.needs_reconfiguration() {
                eprintln!("Update GEMINI_API_KEYS (or pass --keys) and try again.");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Load configuration and apply command-line overrides
fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::load()?;

    if let Some(keys) = &args.keys {
        settings.gemini.api_keys = parse_key_list(keys);
    }
    if let Some(path) = &args.cursor_path {
        settings.key_cursor_path = path.clone();
    }
    if let Some(log_level) = &args.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(log_format) = args.log_format {
        settings.log_format = log_format;
    }
    if args.rotate_on_invalid_key {
        settings.rotate_on_invalid_key = true;
    }

    settings.validate()?;
    Ok(settings)
}

async fn run(command: Command, settings: &Settings) -> Result<(), AppError> {
    match command {
        Command::Trends(args) => run_trends(args).await,
        Command::Analyze(args) => run_analyze(args, settings).await,
        Command::Generate(args) => run_generate(args, settings).await,
        Command::Thumbnail(args) => run_thumbnail(args, settings).await,
        Command::Keys => run_keys(settings).await,
    }
}

async fn run_trends(args: TrendsArgs) -> Result<(), AppError> {
    let raw = match &args.file {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map_err(|e| AppError::InvalidInput(format!("cannot read stdin: {}", e)))?;
            buf
        }
    };

    let titles: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let lang = match (args.lang, args.region.as_deref()) {
        (Some(lang), _) => lang,
        (None, Some(region)) => Language::for_region(region),
        (None, None) => Language::default(),
    };
    let options = KeywordOptions::new()
        .with_top_n(args.top)
        .with_min_occurrences(args.min);

    let keywords = extract_keywords_with(&titles, lang, &options);

    tracing::info!(
        titles = titles.len(),
        keywords = keywords.len(),
        lang = %lang,
        "Extracted trending keywords"
    );

    for keyword in keywords {
        println!("{}", keyword);
    }
    Ok(())
}

async fn run_analyze(args: AnalyzeArgs, settings: &Settings) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.details).await.map_err(|e| {
        AppError::InvalidInput(format!("cannot read {}: {}", args.details.display(), e))
    })?;
    let video: VideoDetails = serde_json::from_str(&raw).map_err(|e| {
        AppError::InvalidInput(format!(
            "invalid video details in {}: {}",
            args.details.display(),
            e
        ))
    })?;

    let client = build_client(settings)?;
    let invoker = build_invoker(settings).await;
    let model = args.model.unwrap_or_else(|| settings.gemini.text_model.clone());
    let request = analysis_request(&video, args.lang, model);

    let invoked = invoker.invoke(&GenerateText::new(client), &request).await?;

    tracing::info!(
        video_id = %video.video_id,
        lang = %args.lang,
        key_index = invoked.credential_index,
        attempts = invoked.attempts,
        "Generated SEO report"
    );
    println!("{}", invoked.value);
    Ok(())
}

async fn run_generate(args: GenerateArgs, settings: &Settings) -> Result<(), AppError> {
    let prompt = match (args.prompt, &args.prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?,
        (None, None) => return Err(AppError::InvalidInput("a prompt is required".to_string())),
    };

    let client = build_client(settings)?;
    let invoker = build_invoker(settings).await;
    let request = TextRequest::new(prompt)
        .with_model(args.model.unwrap_or_else(|| settings.gemini.text_model.clone()));

    let invoked = invoker.invoke(&GenerateText::new(client), &request).await?;

    println!("{}", invoked.value);
    Ok(())
}

async fn run_thumbnail(args: ThumbnailArgs, settings: &Settings) -> Result<(), AppError> {
    let client = build_client(settings)?;
    let image = client
        .fetch_image_base64(&args.image_url)
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let invoker = build_invoker(settings).await;
    let request = ThumbnailRequest::new(image, args.prompt)
        .with_model(args.model.unwrap_or_else(|| settings.gemini.image_model.clone()));

    let invoked = invoker
        .invoke(&RecreateThumbnail::new(client), &request)
        .await?;

    let png = decode_data_url(&invoked.value).map_err(|e| AppError::Remote(e.to_string()))?;
    tokio::fs::write(&args.out, &png).await.map_err(|e| {
        AppError::InvalidInput(format!("cannot write {}: {}", args.out.display(), e))
    })?;

    tracing::info!(path = %args.out.display(), bytes = png.len(), "Wrote thumbnail");
    println!("{}", args.out.display());
    Ok(())
}

async fn run_keys(settings: &Settings) -> Result<(), AppError> {
    let store = FileCursorStore::new(&settings.key_cursor_path);
    let persisted = store.load().await.map_err(anyhow::Error::from)?;
    let pool = CredentialPool::restore(settings.credentials(), Arc::new(store)).await;
    let stats = pool.stats();

    println!("Keys configured: {}", stats.total);
    for (index, key) in stats.masked_keys.iter().enumerate() {
        let marker = if index == stats.cursor { "*" } else { " " };
        println!("  {} [{}] {}", marker, index, key);
    }
    match persisted {
        Some(index) => println!("Persisted cursor: {}", index),
        None => println!("Persisted cursor: none"),
    }
    Ok(())
}

fn build_client(settings: &Settings) -> Result<GeminiClient, AppError> {
    GeminiClient::new(settings.gemini_config()).map_err(|e| AppError::Internal(e.into()))
}

async fn build_invoker(settings: &Settings) -> FailoverInvoker {
    let store = Arc::new(FileCursorStore::new(&settings.key_cursor_path));
    let pool = CredentialPool::restore(settings.credentials(), store).await;
    FailoverInvoker::new(Arc::new(pool)).with_policy(settings.failover_policy())
}

/// Initialize tracing subscriber on stderr so stdout carries only results
fn init_tracing(log_level: &str, format: LogFormat) {
    // Build filter from RUST_LOG env var or use provided log level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).init();
}
