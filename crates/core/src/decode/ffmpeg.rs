use crate::decode::{DecodeError, Result, Waveform};
use bytes::Bytes;
use ffmpeg_sidecar::{download, paths::ffmpeg_path};

const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Resamples any container ffmpeg understands to 16 kHz mono f32.
#[derive(Clone, Debug, Default)]
pub struct FfmpegAudioDecoder;

impl FfmpegAudioDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Downloads a static ffmpeg build when none is on the path.
    ///
    /// Blocking; call once at startup.
    pub fn ensure_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| DecodeError::FfmpegUnavailable(e.to_string()))
    }

    pub async fn decode(&self, audio: Bytes) -> Result<Waveform> {
        let samples = self.decode_with_ffmpeg(audio).await?;
        Ok(Waveform::new(samples, WHISPER_SAMPLE_RATE))
    }

    fn parse_f32le_mono(raw: &[u8]) -> Result<Vec<f32>> {
        if !raw.len().is_multiple_of(4usize) {
            return Err(DecodeError::InvalidPcm(format!(
                "f32le byte length must be multiple of 4, got {}",
                raw.len()
            )));
        }
        let mut out = Vec::with_capacity(raw.len() / 4);
        for chunk in raw.chunks_exact(4) {
            out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(out)
    }

    async fn decode_with_ffmpeg(&self, audio: Bytes) -> Result<Vec<f32>> {
        let mut child = tokio::process::Command::new(ffmpeg_path())
            .args([
                "-hide_banner",
                "-nostdin",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-vn",
                "-sn",
                "-dn",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "pipe:1",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdin unavailable (pipe not created)".to_owned())
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdout unavailable (pipe not created)".to_owned())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stderr unavailable (pipe not created)".to_owned())
        })?;

        let stdin_task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(&audio).await?;
            stdin.shutdown().await?;
            Ok::<(), std::io::Error>(())
        });

        let stdout_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let stderr_task = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        let status = child
            .wait()
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        // ffmpeg may exit before draining stdin on malformed input; the exit
        // status below reports the real failure.
        if let Err(e) = stdin_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
        {
            tracing::debug!(error = %e, "ffmpeg stdin closed early");
        }

        let stdout_bytes = stdout_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let stderr_bytes = stderr_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        if !status.success() {
            let stderr_s = String::from_utf8_lossy(&stderr_bytes).trim().to_owned();
            return Err(DecodeError::FfmpegFailed(format!(
                "exit_code={:?} stderr={stderr_s}",
                status.code()
            )));
        }

        Self::parse_f32le_mono(&stdout_bytes)
    }
}
