use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
    pub size: usize,
}

#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, download: Download) -> Result<Delivery, String>;
}

/// Saves downloads into a directory under their suggested names.
///
/// Bytes go to a hidden `.part` file first and are renamed into place, so a
/// half-written result never shows up under the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, download: Download) -> Result<Delivery, String> {
        let file_name = Path::new(&download.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("Invalid download name: {:?}", download.file_name))?;

        if !self.dir.exists() {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| format!("Failed to create output directory {:?}: {}", self.dir, e))?;
        }

        let final_path = self.dir.join(&file_name);
        let part_path = self.dir.join(format!(".{}.part", Uuid::new_v4()));

        let written = write_part(&part_path, &download.bytes).await;
        let result = match written {
            Ok(()) => tokio::fs::rename(&part_path, &final_path)
                .await
                .map_err(|e| format!("Failed to move {:?} to {:?}: {}", part_path, final_path, e)),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!("{}", e);
            if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temporary file {:?}: {}", part_path, cleanup);
                }
            }
            return Err(e);
        }

        info!(
            "Saved {} ({}, {} bytes) to {:?}",
            file_name,
            download.media_type,
            download.bytes.len(),
            final_path
        );
        Ok(Delivery {
            path: final_path,
            file_name,
            media_type: download.media_type,
            size: download.bytes.len(),
        })
    }
}

async fn write_part(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let mut file = TokioFile::create(path)
        .await
        .map_err(|e| format!("Failed to create file {:?}: {}", path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| format!("Failed to write to file {:?}: {}", path, e))?;
    file.flush()
        .await
        .map_err(|e| format!("Failed to flush file {:?}: {}", path, e))?;
    debug!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}
