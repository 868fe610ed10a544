//! Save-as-file for the live artifact.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::orchestration::artifact::ArtifactSnapshot;

/// Filename used for every download.
pub const DOWNLOAD_FILENAME: &str = "CV_ATS_Optimized.pdf";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ArtifactSaver: Send + Sync {
    async fn save(&self, artifact: &ArtifactSnapshot, filename: &str) -> Result<(), SaveError>;
}

/// Writes artifacts into a fixed directory, overwriting the previous download.
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn target(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

#[async_trait]
impl ArtifactSaver for DirectorySaver {
    async fn save(&self, artifact: &ArtifactSnapshot, filename: &str) -> Result<(), SaveError> {
        let path = self.target(filename);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SaveError::Io {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|source| SaveError::Io {
                path: path.clone(),
                source,
            })?;
        info!(
            "Saved artifact {} ({} bytes) to {}",
            artifact.info.id,
            artifact.info.byte_len,
            path.display()
        );
        Ok(())
    }
}
