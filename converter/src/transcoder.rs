// converter/src/transcoder.rs
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use ffmpeg_sidecar::log_parser::parse_time_str;
use log::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::engine::{MediaEngine, ProgressFn};
use crate::error::EngineError;

/// Drives an `ffmpeg` binary. Its staging area is a private directory that
/// is created on load; directives refer to staged files by bare name.
pub struct FfmpegEngine {
    program: String,
    staging_root: PathBuf,
    staging_dir: Mutex<Option<PathBuf>>,
}

impl FfmpegEngine {
    pub fn new(program: impl Into<String>, staging_root: impl Into<PathBuf>) -> Self {
        FfmpegEngine {
            program: program.into(),
            staging_root: staging_root.into(),
            staging_dir: Mutex::new(None),
        }
    }

    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.staging_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn staged_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let dir = self.staging_dir().ok_or(EngineError::NotLoaded)?;
        Ok(dir.join(checked_name(name)?))
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        let dir = self
            .staging_dir
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dir) = dir {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => debug!("Removed staging directory {:?}", dir),
                Err(e) => warn!("Failed to remove staging directory {:?}: {}", dir, e),
            }
        }
    }
}

/// Staging names must be exactly one ordinary path component.
fn checked_name(name: &str) -> Result<&str, EngineError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(EngineError::InvalidName(name.to_string())),
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn load(&self) -> Result<(), EngineError> {
        let program = self.program.clone();
        let probe = tokio::task::spawn_blocking(move || {
            Command::new(&program)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .output()
                .map_err(|source| EngineError::Spawn { program, source })
        })
        .await??;

        if !probe.status.success() {
            return Err(EngineError::Failed(probe.status.to_string()));
        }
        let banner = String::from_utf8_lossy(&probe.stdout);
        info!(
            "Found {}",
            banner.lines().next().unwrap_or("ffmpeg (unknown version)")
        );

        let dir = self.staging_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        debug!("Staging directory: {:?}", dir);
        *self.staging_dir.lock().unwrap_or_else(PoisonError::into_inner) = Some(dir);
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.staged_path(name)?;
        tokio::fs::write(&path, data).await?;
        debug!("Staged {} bytes at {:?}", data.len(), path);
        Ok(())
    }

    async fn run(&self, args: &[String], progress: ProgressFn) -> Result<(), EngineError> {
        let dir = self.staging_dir().ok_or(EngineError::NotLoaded)?;
        let program = self.program.clone();
        let args = args.to_vec();
        tokio::task::spawn_blocking(move || run_ffmpeg(&program, &dir, &args, progress)).await?
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.staged_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn unlink(&self, name: &str) -> Result<(), EngineError> {
        let path = self.staged_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                trace!("Unlinked {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn run_ffmpeg(
    program: &str,
    staging_dir: &Path,
    args: &[String],
    progress: ProgressFn,
) -> Result<(), EngineError> {
    let mut command = FfmpegCommand::new_with_path(program);
    command.hide_banner().overwrite().arg("-nostdin").args(args);
    // Directives name staged files relative to the staging directory
    command.as_inner_mut().current_dir(staging_dir);

    debug!("FFmpeg command: {} {}", program, args.join(" "));

    let mut child = command.spawn().map_err(|source| {
        error!("Failed to execute {}: {}", program, source);
        EngineError::Spawn {
            program: program.to_string(),
            source,
        }
    })?;

    let last_error = match child.iter() {
        Ok(events) => follow_events(events, &progress),
        Err(e) => {
            // Nobody drains the pipes now, so stop the process before reaping it
            if let Err(kill_err) = child.kill() {
                warn!("Failed to stop ffmpeg: {}", kill_err);
            }
            Some(e.to_string())
        }
    };

    let status = child.wait()?;
    if status.success() {
        info!("FFmpeg finished successfully.");
        return Ok(());
    }
    let msg = match last_error {
        Some(reason) => format!("{} ({})", status, reason),
        None => status.to_string(),
    };
    error!("ffmpeg command failed with status: {}", msg);
    Err(EngineError::Failed(msg))
}

/// Forwards progress ratios and returns the last error ffmpeg reported.
fn follow_events(
    events: impl IntoIterator<Item = FfmpegEvent>,
    progress: &ProgressFn,
) -> Option<String> {
    let mut tracker = ProgressTracker::default();
    let mut last_error = None;
    for event in events {
        match &event {
            FfmpegEvent::Error(msg) => {
                warn!("[ffmpeg] {}", msg);
                last_error = Some(msg.clone());
            }
            FfmpegEvent::Log(level, msg) => trace!("[ffmpeg {:?}] {}", level, msg),
            _ => {}
        }
        if let Some(ratio) = tracker.observe(&event) {
            progress(ratio);
        }
    }
    last_error
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    total_secs: Option<f64>,
}

impl ProgressTracker {
    pub fn observe(&mut self, event: &FfmpegEvent) -> Option<f64> {
        match event {
            FfmpegEvent::ParsedDuration(parsed) => {
                // only the first input's length counts
                if self.total_secs.is_none() && parsed.duration > 0.0 {
                    self.total_secs = Some(parsed.duration);
                }
                None
            }
            FfmpegEvent::Progress(report) => {
                let elapsed = parse_time_str(&report.time).filter(|secs| *secs >= 0.0)?;
                match self.total_secs {
                    Some(total) => Some((elapsed / total).clamp(0.0, 1.0)),
                    None => {
                        trace!("Progress reported before a duration was known: {}", report.time);
                        None
                    }
                }
            }
            _ => None,
        }
    }
}
