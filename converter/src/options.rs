use serde::{Deserialize, Serialize};

pub const SEEK_TO: &str = "-ss";
pub const STOP_AT: &str = "-to";
pub const INPUT_PATH: &str = "-i";
pub const AUDIO_BITRATE: &str = "-b:a";
pub const OUTPUT_PREFIX: &str = "converted";

/// Options for one audio conversion, built fresh from the raw form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub trim_start: Option<String>,
    pub trim_end: Option<String>,
    /// Kept as text: the engine validates it, not us.
    pub bitrate_kbps: Option<String>,
    pub input_name: String,
    pub output_format: String,
}

impl ConversionOptions {
    pub fn from_fields(
        input_name: &str,
        output_format: &str,
        trim_start_raw: &str,
        trim_end_raw: &str,
        bitrate_raw: &str,
    ) -> Self {
        ConversionOptions {
            trim_start: non_empty(trim_start_raw),
            trim_end: non_empty(trim_end_raw),
            bitrate_kbps: non_empty(bitrate_raw),
            input_name: input_name.to_string(),
            output_format: output_format.trim().to_string(),
        }
    }

    pub fn output_name(&self) -> String {
        format!("{}.{}", OUTPUT_PREFIX, self.output_format)
    }

    pub fn directives(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(9);

        // Seek and stop must come before -i
        if let Some(start) = &self.trim_start {
            args.push(SEEK_TO.to_string());
            args.push(start.clone());
        }
        if let Some(end) = &self.trim_end {
            args.push(STOP_AT.to_string());
            args.push(end.clone());
        }

        args.push(INPUT_PATH.to_string());
        args.push(self.input_name.clone());

        if let Some(kbps) = &self.bitrate_kbps {
            args.push(AUDIO_BITRATE.to_string());
            args.push(format!("{}k", kbps));
        }

        // Output file is always last
        args.push(self.output_name());
        args
    }
}

pub fn build_directives(
    input_name: &str,
    output_format: &str,
    trim_start_raw: &str,
    trim_end_raw: &str,
    bitrate_raw: &str,
) -> Vec<String> {
    ConversionOptions::from_fields(
        input_name,
        output_format,
        trim_start_raw,
        trim_end_raw,
        bitrate_raw,
    )
    .directives()
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
