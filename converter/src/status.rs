use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Neutral,
    Processing,
    Success,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Neutral => "neutral",
            StatusKind::Processing => "processing",
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Status {
            kind,
            message: message.into(),
        }
    }
}

pub trait StatusPresenter: Send + Sync {
    fn present(&self, status: &Status);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationStyle {
    /// `[success] message`
    #[default]
    Plain,
    // coloured, no tag
    Ansi,
}

impl PresentationStyle {
    pub fn render(&self, status: &Status) -> String {
        match self {
            PresentationStyle::Plain => format!("[{}] {}", status.kind.as_str(), status.message),
            PresentationStyle::Ansi => {
                let colour = match status.kind {
                    StatusKind::Neutral => "0",
                    StatusKind::Processing => "33",
                    StatusKind::Success => "32",
                    StatusKind::Error => "31",
                };
                format!("\x1b[{}m{}\x1b[0m", colour, status.message)
            }
        }
    }
}

impl FromStr for PresentationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(PresentationStyle::Plain),
            "ansi" | "color" | "colour" => Ok(PresentationStyle::Ansi),
            other => Err(format!("unknown status style '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter {
    pub style: PresentationStyle,
}

impl StatusPresenter for ConsolePresenter {
    fn present(&self, status: &Status) {
        eprintln!("{}", self.style.render(status));
    }
}

/// The current status plus the presenter that displays it. Shared by all
/// flows of one process, like a single status line on a page.
pub struct StatusLine {
    current: Mutex<Status>,
    presenter: Arc<dyn StatusPresenter>,
}

impl StatusLine {
    pub fn new(presenter: Arc<dyn StatusPresenter>) -> Self {
        StatusLine {
            current: Mutex::new(Status::new(StatusKind::Neutral, "Ready to start.")),
            presenter,
        }
    }

    pub fn set(&self, kind: StatusKind, message: impl Into<String>) {
        let status = Status::new(kind, message);
        debug!("status {}: {}", kind.as_str(), status.message);
        self.presenter.present(&status);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn current(&self) -> Status {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
