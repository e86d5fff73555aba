use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelection {
    pub path: PathBuf,
    pub name: String,
    /// Empty when the type is unknown.
    pub media_type: String,
}

impl FileSelection {
    pub fn new(path: impl Into<PathBuf>, media_type: Option<&str>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = match media_type {
            Some(declared) => declared.trim().to_ascii_lowercase(),
            None => guess_media_type(&path),
        };
        FileSelection {
            path,
            name,
            media_type,
        }
    }
}

pub fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default()
}

// SVG is matched by name as well
pub fn is_convertible_image(file: &FileSelection) -> bool {
    file.media_type.starts_with("image/") || file.name.to_ascii_lowercase().ends_with(".svg")
}

pub fn is_audio_source(file: &FileSelection) -> bool {
    let t = file.media_type.as_str();
    t.is_empty()
        || t == "application/octet-stream"
        || t.starts_with("audio/")
        || t.starts_with("video/")
}
