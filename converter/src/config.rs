use std::path::PathBuf;

use crate::status::PresentationStyle;

// Configuration Constants
pub const FFMPEG_PATH_ENV_VAR: &str = "CONVERTER_FFMPEG_PATH";
pub const STAGING_DIR_ENV_VAR: &str = "CONVERTER_STAGING_DIR";
pub const OUTPUT_DIR_ENV_VAR: &str = "CONVERTER_OUTPUT_DIR";
pub const STATUS_STYLE_ENV_VAR: &str = "CONVERTER_STATUS_STYLE";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_STAGING_SUBDIR: &str = "converter-staging";
const DEFAULT_OUTPUT_DIR: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ffmpeg_path: String,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub status_style: PresentationStyle,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or empty keys use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let status_style = match get(STATUS_STYLE_ENV_VAR) {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("{}: {}", STATUS_STYLE_ENV_VAR, e))?,
            None => PresentationStyle::default(),
        };

        Ok(Config {
            ffmpeg_path: get(FFMPEG_PATH_ENV_VAR).unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
            staging_dir: get(STAGING_DIR_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_STAGING_SUBDIR)),
            output_dir: PathBuf::from(
                get(OUTPUT_DIR_ENV_VAR).unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            status_style,
        })
    }
}
