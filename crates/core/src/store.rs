use crate::tts::TtsAudio;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// URL prefix the static directory is mounted under.
pub const STATIC_ROUTE: &str = "/static";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StoredAudio {
    pub file_name: String,
    pub url: String,
}

/// Writes synthesized replies into the directory served at [`STATIC_ROUTE`].
#[derive(Clone, Debug)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    /// Saves under a fresh random name so concurrent replies never collide.
    pub async fn save(&self, audio: &TtsAudio) -> Result<StoredAudio, StoreError> {
        self.ensure_dir().await?;

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), audio.extension);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &audio.bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = audio.bytes.len(), "reply audio saved");

        Ok(StoredAudio {
            url: format!("{STATIC_ROUTE}/{file_name}"),
            file_name,
        })
    }
}
