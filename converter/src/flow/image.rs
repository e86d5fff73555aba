use std::sync::Arc;

use log::{error, info};

use super::{FlowState, Pass, Trigger, read_bytes};
use crate::download::{Delivery, Download, DownloadSink};
use crate::error::{ConvertError, UserInputError};
use crate::job::ImageRequest;
use crate::media::{FileSelection, is_convertible_image};
use crate::naming::{TargetFormat, image_download_name};
use crate::raster::Rasterizer;
use crate::resize::{Dimensions, parse_dimension, parse_quality, resize};
use crate::status::{StatusKind, StatusLine};

const READ_FAILED: &str = "Error reading the file.";
const DECODE_FAILED: &str = "Error loading the image file. Ensure file is a valid image.";
const RENDER_FAILED: &str = "Conversion failed during image processing.";
const SAVE_FAILED: &str = "Conversion failed while saving the result.";

/// Image re-encode/resize: read, decode, draw at the new size, encode, save.
pub struct ImageFlow {
    rasterizer: Arc<dyn Rasterizer>,
    sink: Arc<dyn DownloadSink>,
    status: Arc<StatusLine>,
    trigger: Trigger,
}

struct Rendered {
    delivery: Delivery,
    size: Dimensions,
}

impl ImageFlow {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        sink: Arc<dyn DownloadSink>,
        status: Arc<StatusLine>,
    ) -> Self {
        ImageFlow {
            rasterizer,
            sink,
            status,
            trigger: Trigger::new(),
        }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub async fn convert(&self, request: ImageRequest) -> Result<Delivery, ConvertError> {
        if !self.trigger.is_enabled() {
            return Err(UserInputError::Busy.into());
        }
        self.status.set(StatusKind::Neutral, "Ready to start.");

        let mut pass = Pass::begin("image");
        let Some(file) = request.file.as_ref() else {
            return Err(pass.reject(&self.status, UserInputError::NoFile));
        };
        if !is_convertible_image(file) {
            return Err(pass.reject(
                &self.status,
                UserInputError::UnsupportedMediaType {
                    name: file.name.clone(),
                    media_type: file.media_type.clone(),
                    expected: "image (PNG, JPEG, WebP, GIF, BMP or SVG)",
                },
            ));
        }
        if request.format.trim().is_empty() {
            return Err(pass.reject(&self.status, UserInputError::MissingFormat));
        }
        // Held until this function returns, on every path
        let Some(_guard) = self.trigger.try_disable() else {
            pass.finish(FlowState::Failed);
            return Err(UserInputError::Busy.into());
        };

        let target = TargetFormat::parse(&request.format);
        let quality = parse_quality(&request.quality);
        let width = parse_dimension(&request.width);
        let height = parse_dimension(&request.height);

        pass.advance(FlowState::Processing);
        self.status.set(
            StatusKind::Processing,
            format!("Converting {} to .{}...", file.name, target.extension),
        );

        match self.process(file, &target, quality, width, height).await {
            Ok(rendered) => {
                let (w, h) = rendered.size.surface();
                self.status.set(
                    StatusKind::Success,
                    format!(
                        "Conversion complete! {} ({}x{}) is downloading.",
                        rendered.delivery.file_name, w, h
                    ),
                );
                pass.finish(FlowState::Succeeded);
                Ok(rendered.delivery)
            }
            Err((message, detail)) => {
                error!("Image conversion error: {}", detail);
                self.status.set(StatusKind::Error, message);
                pass.finish(FlowState::Failed);
                Err(ConvertError::Conversion(format!("{} ({})", message, detail)))
            }
        }
    }

    /// Errors carry the user-facing message and the underlying detail.
    async fn process(
        &self,
        file: &FileSelection,
        target: &TargetFormat,
        quality: f64,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Rendered, (&'static str, String)> {
        let bytes = read_bytes(file).await.map_err(|e| (READ_FAILED, e))?;

        let decoded = self
            .rasterizer
            .decode(bytes)
            .await
            .map_err(|e| (DECODE_FAILED, e.to_string()))?;

        // Fractional size is kept for the status; the surface is rounded
        let size = resize(decoded.width(), decoded.height(), width, height);
        let surface = size.surface();
        info!(
            "Resizing {}x{} -> {}x{} ({}, quality {})",
            decoded.width(),
            decoded.height(),
            surface.0,
            surface.1,
            target.essence(),
            quality
        );

        let encoded = self
            .rasterizer
            .render(decoded, surface, target, quality)
            .await
            .map_err(|e| (RENDER_FAILED, e.to_string()))?;

        let delivery = self
            .sink
            .deliver(Download {
                file_name: image_download_name(&file.name, &target.extension),
                media_type: target.essence().to_string(),
                bytes: encoded,
            })
            .await
            .map_err(|e| (SAVE_FAILED, e))?;

        Ok(Rendered { delivery, size })
    }
}
