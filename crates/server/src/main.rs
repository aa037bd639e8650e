use anyhow::Context;
use clap::Parser;
use heartline_core::asr::{AsrBackend, DisabledAsrBackend};
use heartline_core::config::{
    parse_bind, require_api_key, resolve_optional_string, resolve_string_with_default, AppConfig,
    AsrConfig, Env, LlmConfig, ServerConfig, ServiceLimits, StdEnv, TtsConfig, DEFAULT_BIND,
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_MAX_CONCURRENT_MODELS,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_STATIC_DIR, DEFAULT_TTS_BASE_URL, DEFAULT_TTS_LANG,
    DEFAULT_UPSTREAM_TIMEOUT_MS, DEFAULT_WHISPER_MODEL_PATH, ENV_BIND, ENV_GEMINI_API_KEY,
    ENV_GEMINI_BASE_URL, ENV_GEMINI_MODEL, ENV_STATIC_DIR, ENV_TTS_LANG, ENV_WHISPER_LANGUAGE,
    ENV_WHISPER_MODEL_PATH,
};
use heartline_core::emotion::EmotionEstimator;
use heartline_core::face::LlmFaceClassifier;
use heartline_core::http::{router, AppState};
use heartline_core::llm::{GeminiClient, LlmClient};
use heartline_core::pipeline::{Pipeline, Services};
use heartline_core::store::AudioStore;
use heartline_core::tts::GoogleTranslateTts;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "heartline")]
#[command(about = "Emotion-aware empathetic replies over HTTP (voice, text, or face -> LLM -> TTS)")]
struct Args {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,

    /// Directory reply audio is written to and served from.
    #[arg(long)]
    static_dir: Option<String>,

    #[arg(long)]
    gemini_api_key: Option<String>,

    #[arg(long)]
    gemini_model: Option<String>,

    #[arg(long)]
    gemini_base_url: Option<String>,

    /// Path to a ggml Whisper model.
    #[arg(long)]
    whisper_model: Option<String>,

    /// Whisper language code; detected when unset.
    #[arg(long)]
    whisper_language: Option<String>,

    #[arg(long)]
    tts_lang: Option<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_MODELS)]
    max_concurrent_models: usize,

    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_MS)]
    upstream_timeout_ms: u64,

    #[arg(long, env = "HEARTLINE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let cfg = build_config(args, &StdEnv)?;

    tracing::info!(
        bind = %cfg.server.bind,
        static_dir = %cfg.server.static_dir.display(),
        llm_model = %cfg.llm.model,
        max_concurrent_models = cfg.limits.max_concurrent_models,
        upstream_timeout_ms = cfg.limits.upstream_timeout_ms,
        "config loaded"
    );

    run_server(cfg).await
}

async fn run_server(cfg: AppConfig) -> anyhow::Result<()> {
    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(&cfg.llm));
    let asr = load_asr(&cfg.asr).await?;

    let store = AudioStore::new(cfg.server.static_dir.clone());
    store
        .ensure_dir()
        .await
        .context("failed to create static directory")?;

    let services = Services {
        asr,
        face: Arc::new(LlmFaceClassifier::new(llm.clone())),
        llm,
        tts: Arc::new(GoogleTranslateTts::new(&cfg.tts)),
        estimator: EmotionEstimator::default(),
        store,
    };
    let pipeline = Pipeline::new(services, cfg.limits);
    let app = router(AppState::new(pipeline), cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(cfg.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind))?;
    tracing::info!(addr = %cfg.server.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Loads Whisper off the runtime. Without a usable model the service still
/// answers text and image requests; audio requests get 503.
#[cfg(feature = "whisper-rs")]
async fn load_asr(cfg: &AsrConfig) -> anyhow::Result<Arc<dyn AsrBackend>> {
    use heartline_core::asr::WhisperAsrBackend;

    let asr_cfg = cfg.clone();
    let loaded = tokio::task::spawn_blocking(move || WhisperAsrBackend::new(&asr_cfg))
        .await
        .context("whisper loader task failed")?;

    match loaded {
        Ok(backend) => Ok(Arc::new(backend)),
        Err(e) => {
            tracing::warn!(error = %e, "speech recognition disabled");
            Ok(Arc::new(DisabledAsrBackend))
        }
    }
}

#[cfg(not(feature = "whisper-rs"))]
async fn load_asr(_cfg: &AsrConfig) -> anyhow::Result<Arc<dyn AsrBackend>> {
    tracing::warn!("built without whisper-rs, speech recognition disabled");
    Ok(Arc::new(DisabledAsrBackend))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let bind = parse_bind(&resolve_string_with_default(
        args.bind,
        ENV_BIND,
        env,
        DEFAULT_BIND,
    ))?;
    let static_dir = resolve_string_with_default(
        args.static_dir,
        ENV_STATIC_DIR,
        env,
        DEFAULT_STATIC_DIR,
    );
    let server = ServerConfig::new(bind, PathBuf::from(static_dir), args.max_upload_bytes)?;

    let llm = LlmConfig {
        api_key: require_api_key(args.gemini_api_key, ENV_GEMINI_API_KEY, env)?,
        model: resolve_string_with_default(
            args.gemini_model,
            ENV_GEMINI_MODEL,
            env,
            DEFAULT_GEMINI_MODEL,
        ),
        base_url: resolve_string_with_default(
            args.gemini_base_url,
            ENV_GEMINI_BASE_URL,
            env,
            DEFAULT_GEMINI_BASE_URL,
        ),
    };

    let asr = AsrConfig {
        model_path: PathBuf::from(resolve_string_with_default(
            args.whisper_model,
            ENV_WHISPER_MODEL_PATH,
            env,
            DEFAULT_WHISPER_MODEL_PATH,
        )),
        language: resolve_optional_string(args.whisper_language, ENV_WHISPER_LANGUAGE, env),
    };

    let tts = TtsConfig {
        lang: resolve_string_with_default(args.tts_lang, ENV_TTS_LANG, env, DEFAULT_TTS_LANG),
        base_url: DEFAULT_TTS_BASE_URL.to_owned(),
    };

    let limits = ServiceLimits::new(args.max_concurrent_models, args.upstream_timeout_ms)?;

    Ok(AppConfig {
        server,
        llm,
        asr,
        tts,
        limits,
    })
}
