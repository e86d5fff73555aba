use thiserror::Error;

/// Problems with what the user asked for. No engine is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserInputError {
    #[error("Please select a file first.")]
    NoFile,

    #[error("'{name}' ({media_type}) is not a supported {expected} file.")]
    UnsupportedMediaType {
        name: String,
        media_type: String,
        expected: &'static str,
    },

    #[error("Please choose an output format.")]
    MissingFormat,

    #[error("The media engine is not loaded yet. Please wait.")]
    EngineNotReady,

    /// The trigger is disabled while a conversion of the same flow runs.
    #[error("A conversion is already running.")]
    Busy,
}

/// Everything a flow can report back. All variants are terminal for the
/// request; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    #[error("Failed to load the media engine: {0}")]
    EngineLoad(String),

    #[error("{0}")]
    Conversion(String),
}

impl ConvertError {
    pub fn is_user_input(&self) -> bool {
        matches!(self, ConvertError::UserInput(_))
    }
}

/// Failures of the external media engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited with status: {0}")]
    Failed(String),

    #[error("engine is not loaded")]
    NotLoaded,

    #[error("invalid staging name: {0:?}")]
    InvalidName(String),

    #[error("engine task failed (panic/cancellation): {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("rasterizer task failed (panic/cancellation): {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive task failed (panic/cancellation): {0}")]
    Join(#[from] tokio::task::JoinError),
}
