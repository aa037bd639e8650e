use crate::asr::{AsrBackend, AsrError, Transcript};
use crate::config::AsrConfig;
use crate::decode::FfmpegAudioDecoder;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const LOG_TARGET: &str = "asr::whisper";

/// Whisper transcription. The model is loaded once and shared between requests.
#[derive(Clone)]
pub struct WhisperAsrBackend {
    ctx: Arc<WhisperContext>,
    decoder: FfmpegAudioDecoder,
    language: Option<String>,
}

impl WhisperAsrBackend {
    /// Loads the ggml model and makes sure ffmpeg is present. Blocking.
    pub fn new(config: &AsrConfig) -> Result<Self, AsrError> {
        let path = config.model_path.display().to_string();
        let ctx = WhisperContext::new_with_params(&path, WhisperContextParameters::default())
            .map_err(|e| AsrError::ModelLoad {
                path: path.clone(),
                details: e.to_string(),
            })?;

        let decoder = FfmpegAudioDecoder::new();
        decoder.ensure_available()?;

        tracing::info!(target: LOG_TARGET, model = %path, "whisper model loaded");

        Ok(Self {
            ctx: Arc::new(ctx),
            decoder,
            language: config.language.clone(),
        })
    }

    fn run(
        ctx: &WhisperContext,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<String, AsrError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(language);

        let mut state = ctx
            .create_state()
            .map_err(|e| AsrError::Inference(format!("failed to create state: {e}")))?;
        state
            .full(params, samples)
            .map_err(|e| AsrError::Inference(e.to_string()))?;

        let mut parts = Vec::new();
        for i in 0..state.full_n_segments() {
            let Some(segment) = state.get_segment(i) else {
                continue;
            };
            let text = segment
                .to_str_lossy()
                .map_err(|e| AsrError::Inference(e.to_string()))?;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_owned());
            }
        }

        Ok(parts.join(" "))
    }
}

impl AsrBackend for WhisperAsrBackend {
    fn transcribe(&self, audio: Bytes) -> BoxFuture<'_, Result<Transcript, AsrError>> {
        async move {
            let waveform = self.decoder.decode(audio).await?;
            let audio_duration = waveform.duration();

            let ctx = Arc::clone(&self.ctx);
            let language = self.language.clone();
            let text = tokio::task::spawn_blocking(move || {
                Self::run(&ctx, &waveform.samples, language.as_deref())
            })
            .await
            .map_err(|e| AsrError::Inference(format!("transcription task failed: {e}")))??;

            tracing::debug!(
                target: LOG_TARGET,
                chars = text.len(),
                audio_ms = audio_duration.as_millis() as u64,
                "transcribed"
            );

            Ok(Transcript {
                text,
                audio_duration,
            })
        }
        .boxed()
    }
}
