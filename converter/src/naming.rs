use serde::{Deserialize, Serialize};

pub const AUDIO_FALLBACK_STEM: &str = "audio";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Text before the last dot, or `None` when there is no usable stem.
pub fn file_stem(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(&name[..idx]),
        _ => None,
    }
}

/// `clip.mov` + `mp3` -> `clip-mp3.mp3`
pub fn audio_download_name(original: &str, format: &str) -> String {
    let stem = file_stem(original).unwrap_or(AUDIO_FALLBACK_STEM);
    format!("{}-{}.{}", stem, format, format)
}

/// `clip.mov` + `webp` -> `clip.webp`
pub fn image_download_name(original: &str, extension: &str) -> String {
    let stem = file_stem(original).unwrap_or(original);
    format!("{}.{}", stem, extension)
}

pub fn archive_download_name(original: &str) -> String {
    image_download_name(original, ARCHIVE_EXTENSION)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFormat {
    pub mime: String,
    pub extension: String,
}

impl TargetFormat {
    /// Accepts a MIME type (`image/jpeg`) or a bare extension (`jpg`).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mime = if raw.contains('/') {
            raw.to_ascii_lowercase()
        } else {
            let ext = raw.trim_start_matches('.').to_ascii_lowercase();
            let subtype = if ext == "jpg" { "jpeg".to_string() } else { ext };
            format!("image/{}", subtype)
        };

        let subtype = mime.split('/').nth(1).unwrap_or_default();
        let subtype = subtype.split(';').next().unwrap_or_default().trim();
        let extension = subtype.replace("jpeg", "jpg");

        TargetFormat { mime, extension }
    }

    pub fn essence(&self) -> &str {
        self.mime.split(';').next().unwrap_or_default().trim()
    }
}
