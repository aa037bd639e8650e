//! Turns one request into one reply: work out what the user said and how
//! they seem to feel, ask the LLM for a response, and voice it.

use crate::asr::{AsrBackend, AsrError};
use crate::config::ServiceLimits;
use crate::decode::FormatHint;
use crate::emotion::{AnalysisFailure, EmotionEstimator, EmotionLabel, Estimate};
use crate::face::{FaceEmotion, FaceEmotionClassifier, FaceError, ImageUpload};
use crate::llm::{LlmClient, LlmError, LlmRequest};
use crate::prompt::{empathy_prompt, normalize_reply, parse_sentiment, sentiment_prompt, Sentiment};
use crate::store::{AudioStore, StoreError};
use crate::tts::{TtsClient, TtsError, TtsRequest};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const LOG_TARGET: &str = "pipeline";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyzeInput {
    Text(String),
    Audio(AudioUpload),
    Image(ImageUpload),
}

/// Where the reported emotion came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectedEmotion {
    /// Text input carries no emotion signal.
    Unanalyzed,
    Voice(EmotionLabel),
    Face(FaceEmotion),
}

impl fmt::Display for DetectedEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedEmotion::Unanalyzed => f.write_str(EmotionLabel::Neutral.as_str()),
            DetectedEmotion::Voice(label) => f.write_str(label.as_str()),
            DetectedEmotion::Face(emotion) => f.write_str(emotion.as_str()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzeReply {
    pub transcript: String,
    pub response: String,
    pub audio_url: String,
    pub emotion: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Transcription(#[from] AsrError),

    #[error("{0}")]
    Face(#[from] FaceError),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("speech synthesis failed: {0}")]
    Tts(#[from] TtsError),

    #[error("could not store reply audio: {0}")]
    Store(#[from] StoreError),

    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("model capacity unavailable")]
    CapacityClosed,
}

/// The external collaborators a pipeline delegates to.
#[derive(Clone)]
pub struct Services {
    pub asr: Arc<dyn AsrBackend>,
    pub llm: Arc<dyn LlmClient>,
    pub face: Arc<dyn FaceEmotionClassifier>,
    pub tts: Arc<dyn TtsClient>,
    pub estimator: EmotionEstimator,
    pub store: AudioStore,
}

#[derive(Clone)]
pub struct Pipeline {
    services: Services,
    model_permits: Arc<Semaphore>,
    /// Held by acoustic analysis until its blocking task actually ends.
    analysis_permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(services: Services, limits: ServiceLimits) -> Self {
        Self {
            services,
            model_permits: Arc::new(Semaphore::new(limits.max_concurrent_models)),
            analysis_permits: Arc::new(Semaphore::new(limits.max_concurrent_models)),
            timeout: limits.upstream_timeout(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn analyze(&self, input: AnalyzeInput) -> Result<AnalyzeReply, PipelineError> {
        let (transcript, emotion) = self.understand(input).await?;

        let prompt = empathy_prompt(&transcript, &emotion.to_string());
        let raw = self
            .bounded("llm", self.services.llm.generate(LlmRequest::text(prompt)))
            .await??;
        let response = normalize_reply(&raw);

        let audio = self
            .bounded(
                "tts",
                self.services.tts.synthesize(TtsRequest::new(response.clone())),
            )
            .await??;
        let stored = self.services.store.save(&audio).await?;

        tracing::info!(
            target: LOG_TARGET,
            %emotion,
            transcript_chars = transcript.len(),
            reply_chars = response.len(),
            audio = %stored.file_name,
            "reply ready"
        );

        Ok(AnalyzeReply {
            transcript,
            response,
            audio_url: stored.url,
            emotion: emotion.to_string(),
        })
    }

    pub async fn sentiment(&self, text: &str) -> Result<Sentiment, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("Text is required.".to_owned()));
        }
        let reply = self
            .bounded(
                "llm",
                self.services.llm.generate(LlmRequest::text(sentiment_prompt(text))),
            )
            .await??;
        Ok(parse_sentiment(&reply))
    }

    pub async fn classify_face(&self, image: ImageUpload) -> Result<FaceEmotion, PipelineError> {
        let emotion = self
            .bounded_model("face", self.services.face.classify(image))
            .await??;
        Ok(emotion)
    }

    async fn understand(
        &self,
        input: AnalyzeInput,
    ) -> Result<(String, DetectedEmotion), PipelineError> {
        match input {
            AnalyzeInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(PipelineError::InvalidInput(
                        "No text provided in JSON".to_owned(),
                    ));
                }
                Ok((text, DetectedEmotion::Unanalyzed))
            }
            AnalyzeInput::Audio(audio) => {
                let hint = FormatHint::from_mime(&audio.content_type);
                let transcription = self
                    .bounded_model("transcription", self.services.asr.transcribe(audio.bytes.clone()));
                let (transcript, estimate) =
                    tokio::join!(transcription, self.estimate(audio.bytes, hint));
                let transcript = transcript??;
                Ok((transcript.text, DetectedEmotion::Voice(estimate.label())))
            }
            AnalyzeInput::Image(image) => {
                let emotion = self.classify_face(image).await?;
                Ok((format!("My face shows {emotion}"), DetectedEmotion::Face(emotion)))
            }
        }
    }

    /// Runs the estimator on a blocking thread under an analysis permit and
    /// the upstream timeout. Timeouts and panics still yield a label.
    ///
    /// The permit moves into the blocking task, so an estimate abandoned on
    /// timeout keeps its slot until the thread is free again.
    async fn estimate(&self, audio: Bytes, hint: FormatHint) -> Estimate {
        let estimator = self.services.estimator.clone();
        let permits = Arc::clone(&self.analysis_permits);

        let work = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| AnalysisFailure::Unavailable)?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                estimator.estimate_encoded(audio, &hint)
            })
            .await
            .map_err(|e| AnalysisFailure::Numerical(e.to_string()))
        };

        let reason = match self.bounded("emotion", work).await {
            Ok(Ok(estimate)) => return estimate,
            Ok(Err(reason)) => reason,
            Err(_) => AnalysisFailure::TimedOut(self.timeout),
        };
        tracing::warn!(target: LOG_TARGET, error = %reason, "emotion analysis incomplete, using neutral");
        Estimate::Fallback { reason }
    }

    async fn bounded<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                tracing::warn!(target: LOG_TARGET, stage, timeout_ms = self.timeout.as_millis() as u64, "upstream call timed out");
                PipelineError::Timeout {
                    stage,
                    timeout: self.timeout,
                }
            })
    }

    /// Like [`Self::bounded`], but also holds a model permit while running.
    async fn bounded_model<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        self.bounded(stage, async {
            let _permit = self
                .model_permits
                .acquire()
                .await
                .map_err(|_| PipelineError::CapacityClosed)?;
            Ok::<T, PipelineError>(fut.await)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::DisabledAsrBackend;
    use crate::decode::native::tests::wav_bytes;
    use crate::test_support::{EchoTts, StubAsr, StubFace, StubLlm};
    use std::f32::consts::PI;

    struct Harness {
        pipeline: Pipeline,
        llm: Arc<StubLlm>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(llm: StubLlm, asr: Arc<dyn AsrBackend>, limits: ServiceLimits) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(llm);
        let services = Services {
            asr,
            llm: llm.clone(),
            face: Arc::new(StubFace {
                emotion: FaceEmotion::Happy,
            }),
            tts: Arc::new(EchoTts),
            estimator: EmotionEstimator::default(),
            store: AudioStore::new(dir.path().join("static")),
        };
        Harness {
            pipeline: Pipeline::new(services, limits),
            llm,
            _dir: dir,
        }
    }

    fn harness(llm: StubLlm) -> Harness {
        harness_with(
            llm,
            Arc::new(StubAsr {
                text: "I had a long day".to_owned(),
            }),
            ServiceLimits::default(),
        )
    }

    fn calm_wav() -> Bytes {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| 0.2 * (2.0 * PI * 100.0 * i as f32 / 16_000.0).sin())
            .collect();
        wav_bytes(&samples, 16_000, 1)
    }

    #[tokio::test]
    async fn text_input_keeps_neutral_emotion() {
        let h = harness(StubLlm::replying("  That sounds hard.  "));
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Text("I failed my exam".to_owned()))
            .await
            .unwrap();

        assert_eq!(reply.transcript, "I failed my exam");
        assert_eq!(reply.response, "That sounds hard.");
        assert_eq!(reply.emotion, "neutral");
        assert!(reply.audio_url.starts_with("/static/"));
        assert!(h.llm.last_prompt().unwrap().contains("Detected emotion: neutral."));

        let file = reply.audio_url.trim_start_matches("/static/");
        let spoken = std::fs::read(h.pipeline.services().store.dir().join(file)).unwrap();
        assert_eq!(spoken, b"That sounds hard.");
    }

    #[tokio::test]
    async fn audio_input_is_transcribed_and_estimated() {
        let h = harness(StubLlm::replying("Glad you're taking it slow."));
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Audio(AudioUpload {
                content_type: "audio/wav".to_owned(),
                bytes: calm_wav(),
            }))
            .await
            .unwrap();

        assert_eq!(reply.transcript, "I had a long day");
        assert_eq!(reply.emotion, "calm");
        let prompt = h.llm.last_prompt().unwrap();
        assert!(prompt.contains("\"I had a long day\""));
        assert!(prompt.contains("Detected emotion: calm."));
    }

    #[tokio::test]
    async fn undecodable_audio_still_gets_neutral() {
        let h = harness(StubLlm::replying("I'm listening."));
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Audio(AudioUpload {
                content_type: "audio/webm".to_owned(),
                bytes: Bytes::from_static(b"\x1aE\xdf\xa3not really webm"),
            }))
            .await
            .unwrap();
        assert_eq!(reply.emotion, "neutral");
    }

    #[tokio::test]
    async fn image_input_uses_face_emotion() {
        let h = harness(StubLlm::replying("Love to see it."));
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Image(ImageUpload {
                content_type: "image/jpeg".to_owned(),
                bytes: Bytes::from_static(b"\xff\xd8\xff"),
            }))
            .await
            .unwrap();
        assert_eq!(reply.transcript, "My face shows happy");
        assert_eq!(reply.emotion, "happy");
    }

    #[tokio::test]
    async fn empty_llm_reply_uses_fallback_text() {
        let h = harness(StubLlm::replying("   "));
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Text("hello".to_owned()))
            .await
            .unwrap();
        assert_eq!(reply.response, "I'm here for you.");
    }

    #[tokio::test]
    async fn blank_text_is_invalid() {
        let h = harness(StubLlm::replying("unused"));
        let err = h
            .pipeline
            .analyze(AnalyzeInput::Text("  ".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(h.llm.last_prompt().is_none());
    }

    #[tokio::test]
    async fn llm_failure_is_propagated() {
        let h = harness(StubLlm::failing());
        let err = h
            .pipeline
            .analyze(AnalyzeInput::Text("hello".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::Api { status: 400, .. })));
    }

    #[tokio::test]
    async fn missing_transcriber_is_reported() {
        let h = harness_with(
            StubLlm::replying("unused"),
            Arc::new(DisabledAsrBackend),
            ServiceLimits::default(),
        );
        let err = h
            .pipeline
            .analyze(AnalyzeInput::Audio(AudioUpload {
                content_type: "audio/wav".to_owned(),
                bytes: calm_wav(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transcription(AsrError::Unavailable)));
    }

    #[tokio::test]
    async fn slow_llm_times_out() {
        let mut llm = StubLlm::replying("too late");
        llm.delay = Duration::from_secs(5);
        let h = harness_with(
            llm,
            Arc::new(StubAsr {
                text: String::new(),
            }),
            ServiceLimits::new(1, 50).unwrap(),
        );
        let err = h
            .pipeline
            .analyze(AnalyzeInput::Text("hello".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { stage: "llm", .. }));
    }

    #[tokio::test]
    async fn slow_emotion_analysis_falls_back_within_timeout() {
        let samples: Vec<f32> = (0..48_000 * 30)
            .map(|i| 0.02 * (2.0 * PI * 180.0 * i as f32 / 48_000.0).sin())
            .collect();
        let long_wav = wav_bytes(&samples, 48_000, 1);
        let h = harness_with(
            StubLlm::replying("I'm listening."),
            Arc::new(StubAsr {
                text: "it's been a long week".to_owned(),
            }),
            ServiceLimits::new(1, 50).unwrap(),
        );

        let started = std::time::Instant::now();
        let reply = h
            .pipeline
            .analyze(AnalyzeInput::Audio(AudioUpload {
                content_type: "audio/wav".to_owned(),
                bytes: long_wav,
            }))
            .await
            .unwrap();

        assert_eq!(reply.emotion, "neutral");
        assert_eq!(reply.transcript, "it's been a long week");
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn busy_analysis_slot_falls_back_instead_of_waiting() {
        let h = harness_with(
            StubLlm::replying("I'm listening."),
            Arc::new(StubAsr {
                text: "hello".to_owned(),
            }),
            ServiceLimits::new(1, 50).unwrap(),
        );
        let _held = Arc::clone(&h.pipeline.analysis_permits)
            .acquire_owned()
            .await
            .unwrap();

        let estimate = h
            .pipeline
            .estimate(calm_wav(), FormatHint::wav())
            .await;
        assert_eq!(
            estimate,
            Estimate::Fallback {
                reason: AnalysisFailure::TimedOut(Duration::from_millis(50)),
            }
        );
    }

    #[tokio::test]
    async fn sentiment_parses_llm_answer() {
        let h = harness(StubLlm::replying("Stressed\n"));
        let sentiment = h.pipeline.sentiment("deadline tomorrow").await.unwrap();
        assert_eq!(sentiment, Sentiment::Stressed);
        assert!(h.llm.last_prompt().unwrap().contains("Text: \"deadline tomorrow\""));

        let err = h.pipeline.sentiment("").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn detected_emotion_display() {
        assert_eq!(DetectedEmotion::Unanalyzed.to_string(), "neutral");
        assert_eq!(DetectedEmotion::Voice(EmotionLabel::Tense).to_string(), "tense");
        assert_eq!(DetectedEmotion::Face(FaceEmotion::Fear).to_string(), "fear");
    }
}
