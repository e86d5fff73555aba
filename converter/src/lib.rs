//! Local file conversion: audio through ffmpeg, images through the `image`
//! crate, single-file zip packaging.

use std::sync::Arc;

use log::info;

pub mod archive;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod flow;
pub mod job;
pub mod media;
pub mod naming;
pub mod options;
pub mod raster;
pub mod resize;
pub mod status;
pub mod transcoder;

use config::Config;
use download::{DirectorySink, DownloadSink};
use engine::EngineContext;
use flow::{ArchiveFlow, AudioFlow, ImageFlow};
use raster::ImageRasterizer;
use status::{ConsolePresenter, StatusLine};
use transcoder::FfmpegEngine;

/// `RUST_LOG` wins; otherwise `default_filter`.
pub fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// The three flows wired to real collaborators and one shared status line.
pub struct Converters {
    pub audio: AudioFlow,
    pub image: ImageFlow,
    pub archive: ArchiveFlow,
    pub status: Arc<StatusLine>,
}

impl Converters {
    pub fn from_config(config: &Config) -> Self {
        info!(
            "ffmpeg: {}, staging: {:?}, output: {:?}",
            config.ffmpeg_path, config.staging_dir, config.output_dir
        );
        let status = Arc::new(StatusLine::new(Arc::new(ConsolePresenter {
            style: config.status_style,
        })));
        let sink: Arc<dyn DownloadSink> = Arc::new(DirectorySink::new(&config.output_dir));
        let engine = EngineContext::new(Arc::new(FfmpegEngine::new(
            config.ffmpeg_path.clone(),
            config.staging_dir.clone(),
        )));

        Converters {
            audio: AudioFlow::new(engine, Arc::clone(&sink), Arc::clone(&status)),
            image: ImageFlow::new(Arc::new(ImageRasterizer), Arc::clone(&sink), Arc::clone(&status)),
            archive: ArchiveFlow::new(sink, Arc::clone(&status)),
            status,
        }
    }
}
