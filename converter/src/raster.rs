use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::{debug, warn};

use crate::error::RasterError;
use crate::naming::TargetFormat;

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Decodes bitmaps and re-encodes them onto a surface of a given size.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, RasterError>;

    /// Draws `image` scaled to `surface` and encodes it as `target`.
    /// `quality` is a fraction in `(0, 1]`; lossless encoders ignore it.
    async fn render(
        &self,
        image: DecodedImage,
        surface: (u32, u32),
        target: &TargetFormat,
        quality: f64,
    ) -> Result<Vec<u8>, RasterError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRasterizer;

#[async_trait]
impl Rasterizer for ImageRasterizer {
    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, RasterError> {
        tokio::task::spawn_blocking(move || {
            let image = image::load_from_memory(&bytes).map_err(RasterError::Decode)?;
            debug!("Decoded {}x{} image", image.width(), image.height());
            Ok(DecodedImage { image })
        })
        .await?
    }

    async fn render(
        &self,
        image: DecodedImage,
        surface: (u32, u32),
        target: &TargetFormat,
        quality: f64,
    ) -> Result<Vec<u8>, RasterError> {
        let target = target.clone();
        tokio::task::spawn_blocking(move || draw_and_encode(image.image, surface, &target, quality))
            .await?
    }
}

fn draw_and_encode(
    image: DynamicImage,
    (width, height): (u32, u32),
    target: &TargetFormat,
    quality: f64,
) -> Result<Vec<u8>, RasterError> {
    let drawn = if image.dimensions() == (width, height) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    };

    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    match encoder_format(target) {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality(quality));
            DynamicImage::ImageRgb8(drawn.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(RasterError::Encode)?;
        }
        ImageFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut cursor);
            DynamicImage::ImageRgba8(drawn.to_rgba8())
                .write_with_encoder(encoder)
                .map_err(RasterError::Encode)?;
        }
        ImageFormat::Gif => {
            DynamicImage::ImageRgba8(drawn.to_rgba8())
                .write_to(&mut cursor, ImageFormat::Gif)
                .map_err(RasterError::Encode)?;
        }
        ImageFormat::Bmp => {
            DynamicImage::ImageRgba8(drawn.to_rgba8())
                .write_to(&mut cursor, ImageFormat::Bmp)
                .map_err(RasterError::Encode)?;
        }
        _ => {
            drawn
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(RasterError::Encode)?;
        }
    }

    debug!(
        "Encoded {}x{} surface as {} ({} bytes)",
        width,
        height,
        target.essence(),
        buffer.len()
    );
    Ok(buffer)
}

/// Formats we can encode. Anything else becomes PNG, as a canvas would do.
fn encoder_format(target: &TargetFormat) -> ImageFormat {
    match ImageFormat::from_mime_type(target.essence()) {
        Some(
            format @ (ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::WebP
            | ImageFormat::Gif
            | ImageFormat::Bmp),
        ) => format,
        _ => {
            warn!("Cannot encode {}; falling back to PNG", target.mime);
            ImageFormat::Png
        }
    }
}

fn jpeg_quality(quality: f64) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
