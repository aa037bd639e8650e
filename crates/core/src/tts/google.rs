use crate::config::TtsConfig;
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use url::Url;

/// Longest text the translate_tts endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

const LOG_TARGET: &str = "tts::google";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Google Translate's speech endpoint, the one gTTS talks to.
///
/// Long text is split into chunks and the MP3 responses are concatenated,
/// which players handle as a single stream.
#[derive(Clone)]
pub struct GoogleTranslateTts {
    client: Client,
    base_url: String,
    lang: String,
}

impl GoogleTranslateTts {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            lang: config.lang.clone(),
        }
    }

    fn chunk_url(&self, chunk: &str, lang: &str, idx: usize, total: usize) -> Result<Url, TtsError> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        let url = Url::parse_with_params(
            &format!("{}/translate_tts", self.base_url),
            &[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", lang),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
            ],
        )?;
        Ok(url)
    }

    async fn fetch_chunk(&self, url: Url) -> Result<Bytes, TtsError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Referer", "http://translate.google.com/")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::HttpStatus(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

impl TtsClient for GoogleTranslateTts {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let chunks = split_text(&request.text, MAX_CHUNK_CHARS);
            if chunks.is_empty() {
                return Err(TtsError::EmptyText);
            }
            let lang = request.lang.unwrap_or_else(|| self.lang.clone());

            let mut audio = BytesMut::new();
            for (idx, chunk) in chunks.iter().enumerate() {
                let url = self.chunk_url(chunk, &lang, idx, chunks.len())?;
                let bytes = self.fetch_chunk(url).await?;
                audio.extend_from_slice(&bytes);
            }

            if audio.is_empty() {
                return Err(TtsError::EmptyAudio);
            }

            tracing::debug!(
                target: LOG_TARGET,
                chunks = chunks.len(),
                bytes = audio.len(),
                %lang,
                "speech synthesized"
            );
            Ok(TtsAudio::mp3(audio.freeze()))
        }
        .boxed()
    }
}

/// Packs whitespace-separated words into chunks of at most `max_chars`
/// characters. Words longer than that are split mid-word.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
