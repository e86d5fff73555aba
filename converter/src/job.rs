use serde::{Deserialize, Serialize};

use crate::media::FileSelection;

/// Raw fields of an audio conversion, exactly as the user typed them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AudioRequest {
    pub file: Option<FileSelection>,
    // container/extension, e.g. `mp3`
    pub format: String,
    #[serde(default)]
    pub bitrate: String,
    #[serde(default)]
    pub trim_start: String,
    #[serde(default)]
    pub trim_end: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ImageRequest {
    pub file: Option<FileSelection>,
    /// MIME type or extension, e.g. `image/webp`.
    pub format: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub width: String,
    #[serde(default)]
    pub height: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ArchiveRequest {
    pub file: Option<FileSelection>,
}

/// A request read from a JSON job description.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Job {
    Audio(AudioRequest),
    Image(ImageRequest),
    Archive(ArchiveRequest),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Audio(_) => "audio",
            Job::Image(_) => "image",
            Job::Archive(_) => "archive",
        }
    }
}

pub fn parse_job_from_json(raw: &str) -> Result<Job, String> {
    serde_json::from_str(raw).map_err(|e| format!("Failed to deserialize job from JSON: {}", e))
}
