use std::sync::Arc;

use log::{error, info, warn};

use super::{FlowState, Pass, Trigger, read_bytes};
use crate::download::{Delivery, Download, DownloadSink};
use crate::engine::{EngineContext, EngineState, ProgressFn};
use crate::error::{ConvertError, UserInputError};
use crate::job::AudioRequest;
use crate::media::{FileSelection, is_audio_source};
use crate::naming::audio_download_name;
use crate::options::ConversionOptions;
use crate::status::{StatusKind, StatusLine};

pub const READY_MESSAGE: &str = "Media engine ready. Select a file.";
const FAILED_MESSAGE: &str = "Processing failed. Check the log for details.";

/// Audio transcode/trim through the external media engine. The engine
/// context may be shared, so readiness is read from it on every call.
pub struct AudioFlow {
    engine: EngineContext,
    sink: Arc<dyn DownloadSink>,
    status: Arc<StatusLine>,
    trigger: Trigger,
}

impl AudioFlow {
    pub fn new(engine: EngineContext, sink: Arc<dyn DownloadSink>, status: Arc<StatusLine>) -> Self {
        AudioFlow {
            engine,
            sink,
            status,
            trigger: Trigger::new(),
        }
    }

    /// Whether a click would start a conversion right now.
    pub fn is_enabled(&self) -> bool {
        self.engine.engine_ready() && self.trigger.is_enabled()
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    pub async fn load_engine(&self) -> Result<(), ConvertError> {
        if !self.engine.engine_ready() {
            self.status.set(
                StatusKind::Processing,
                "Media engine is loading... this may take a moment.",
            );
        }
        match self.engine.load().await {
            Ok(()) => {
                self.status.set(StatusKind::Success, READY_MESSAGE);
                Ok(())
            }
            Err(reason) => {
                self.status.set(
                    StatusKind::Error,
                    "Failed to load the media engine. Cannot use the audio tool.",
                );
                Err(ConvertError::EngineLoad(reason))
            }
        }
    }

    pub async fn convert(&self, request: AudioRequest) -> Result<Delivery, ConvertError> {
        // The engine may have been loaded (or failed) through another handle
        match self.engine.state() {
            EngineState::Ready => {}
            EngineState::Failed(reason) => return Err(ConvertError::EngineLoad(reason)),
            EngineState::Unloaded => {
                let pass = Pass::begin("audio");
                return Err(pass.reject(&self.status, UserInputError::EngineNotReady));
            }
        }
        if !self.trigger.is_enabled() {
            return Err(UserInputError::Busy.into());
        }

        let mut pass = Pass::begin("audio");
        let Some(file) = request.file.as_ref() else {
            return Err(pass.reject(&self.status, UserInputError::NoFile));
        };
        if !is_audio_source(file) {
            return Err(pass.reject(
                &self.status,
                UserInputError::UnsupportedMediaType {
                    name: file.name.clone(),
                    media_type: file.media_type.clone(),
                    expected: "audio",
                },
            ));
        }
        if request.format.trim().is_empty() {
            return Err(pass.reject(&self.status, UserInputError::MissingFormat));
        }
        let Some(guard) = self.trigger.try_disable() else {
            pass.finish(FlowState::Failed);
            return Err(UserInputError::Busy.into());
        };

        let options = ConversionOptions::from_fields(
            &file.name,
            &request.format,
            &request.trim_start,
            &request.trim_end,
            &request.bitrate,
        );
        pass.advance(FlowState::Processing);
        self.status.set(
            StatusKind::Processing,
            format!("Preparing {} for processing...", file.name),
        );

        let result = self.process(file, &options).await;
        // Staged entries go before the trigger comes back
        self.release(&options).await;
        drop(guard);

        match result {
            Ok(delivery) => {
                self.status.set(
                    StatusKind::Success,
                    format!("Processing complete! {} is downloading.", delivery.file_name),
                );
                self.status.set(StatusKind::Success, READY_MESSAGE);
                pass.finish(FlowState::Succeeded);
                Ok(delivery)
            }
            Err(detail) => {
                error!("Audio processing error: {}", detail);
                self.status.set(StatusKind::Error, FAILED_MESSAGE);
                pass.finish(FlowState::Failed);
                Err(ConvertError::Conversion(detail))
            }
        }
    }

    async fn process(
        &self,
        file: &FileSelection,
        options: &ConversionOptions,
    ) -> Result<Delivery, String> {
        let bytes = read_bytes(file).await?;
        let engine = self.engine.engine();

        engine
            .write_file(&options.input_name, &bytes)
            .await
            .map_err(|e| format!("Failed to stage {}: {}", options.input_name, e))?;

        let args = options.directives();
        info!("FFmpeg command: {}", args.join(" "));
        engine
            .run(&args, self.progress_reporter())
            .await
            .map_err(|e| format!("Engine run failed: {}", e))?;

        let output_name = options.output_name();
        let data = engine
            .read_file(&output_name)
            .await
            .map_err(|e| format!("Failed to read {}: {}", output_name, e))?;

        self.sink
            .deliver(Download {
                file_name: audio_download_name(&file.name, &options.output_format),
                media_type: format!("audio/{}", options.output_format),
                bytes: data,
            })
            .await
    }

    // once per pass, whatever the outcome
    async fn release(&self, options: &ConversionOptions) {
        let engine = self.engine.engine();
        for name in [options.input_name.clone(), options.output_name()] {
            if let Err(e) = engine.unlink(&name).await {
                warn!("Failed to remove staged {}: {}", name, e);
            }
        }
    }

    fn progress_reporter(&self) -> ProgressFn {
        let status = Arc::clone(&self.status);
        Arc::new(move |ratio: f64| {
            if ratio < 0.0 {
                return;
            }
            let percentage = (ratio * 100.0).round();
            status.set(
                StatusKind::Processing,
                format!("Processing... {}%", percentage),
            );
        })
    }
}
