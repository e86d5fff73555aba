use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use converter::download::{DirectorySink, DownloadSink};
use converter::engine::{EngineContext, MediaEngine, ProgressFn};
use converter::error::{ConvertError, EngineError, RasterError, UserInputError};
use converter::flow::{ArchiveFlow, AudioFlow, ImageFlow};
use converter::job::{ArchiveRequest, AudioRequest, ImageRequest};
use converter::media::FileSelection;
use converter::naming::TargetFormat;
use converter::raster::{DecodedImage, ImageRasterizer, Rasterizer};
use converter::status::{Status, StatusKind, StatusLine, StatusPresenter};

#[derive(Default)]
struct Recorder(Mutex<Vec<Status>>);

impl StatusPresenter for Recorder {
    fn present(&self, status: &Status) {
        self.0.lock().unwrap().push(status.clone());
    }
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|s| s.message.clone()).collect()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FailAt {
    Nothing,
    Load,
    Write,
    Run,
}

/// In-memory engine that "transcodes" by copying the staged input.
struct FakeEngine {
    fail_at: FailAt,
    files: Mutex<HashMap<String, Vec<u8>>>,
    runs: Mutex<Vec<Vec<String>>>,
    unlinks: Mutex<Vec<String>>,
    loads: AtomicUsize,
    // run() parks on `gate` after signalling `entered`
    gate: Option<Arc<Notify>>,
    entered: Notify,
}

impl FakeEngine {
    fn new(fail_at: FailAt) -> Arc<Self> {
        Arc::new(FakeEngine {
            fail_at,
            files: Mutex::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
            unlinks: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            gate: None,
            entered: Notify::new(),
        })
    }

    fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(FakeEngine {
            fail_at: FailAt::Nothing,
            files: Mutex::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
            unlinks: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            gate: Some(gate),
            entered: Notify::new(),
        })
    }

    fn unlink_count(&self, name: &str) -> usize {
        self.unlinks.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn load(&self) -> Result<(), EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == FailAt::Load {
            return Err(EngineError::Failed("core missing".into()));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        if self.fail_at == FailAt::Write {
            return Err(EngineError::Io(std::io::Error::other("disk full")));
        }
        self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn run(&self, args: &[String], progress: ProgressFn) -> Result<(), EngineError> {
        self.runs.lock().unwrap().push(args.to_vec());
        if self.fail_at == FailAt::Run {
            return Err(EngineError::Failed("exit status: 1".into()));
        }
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        progress(-1.0);
        progress(0.5);
        progress(1.0);

        let input_idx = args.iter().position(|a| a == "-i").unwrap() + 1;
        let output = args.last().unwrap().clone();
        let mut files = self.files.lock().unwrap();
        let data = files.get(&args[input_idx]).cloned().unwrap_or_default();
        files.insert(output, data);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
    }

    async fn unlink(&self, name: &str) -> Result<(), EngineError> {
        self.unlinks.lock().unwrap().push(name.to_string());
        self.files.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Counts calls and delegates to the real rasterizer.
#[derive(Default)]
struct CountingRasterizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Rasterizer for CountingRasterizer {
    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ImageRasterizer.decode(bytes).await
    }

    async fn render(
        &self,
        image: DecodedImage,
        surface: (u32, u32),
        target: &TargetFormat,
        quality: f64,
    ) -> Result<Vec<u8>, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ImageRasterizer.render(image, surface, target, quality).await
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    input_dir: std::path::PathBuf,
    sink: Arc<dyn DownloadSink>,
    output_dir: std::path::PathBuf,
    recorder: Arc<Recorder>,
    status: Arc<StatusLine>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        let output_dir = dir.path().join("out");
        std::fs::create_dir_all(&input_dir).unwrap();
        let recorder = Arc::new(Recorder::default());
        let status = Arc::new(StatusLine::new(recorder.clone()));
        Harness {
            sink: Arc::new(DirectorySink::new(&output_dir)),
            _dir: dir,
            input_dir,
            output_dir,
            recorder,
            status,
        }
    }

    fn file(&self, name: &str, bytes: &[u8]) -> FileSelection {
        let path = self.input_dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        FileSelection::new(path, None)
    }

    fn outputs(&self) -> Vec<String> {
        if !self.output_dir.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

async fn loaded_audio(h: &Harness, fail_at: FailAt) -> (AudioFlow, Arc<FakeEngine>) {
    let engine = FakeEngine::new(fail_at);
    let flow = AudioFlow::new(
        EngineContext::new(engine.clone()),
        Arc::clone(&h.sink),
        Arc::clone(&h.status),
    );
    if fail_at != FailAt::Load {
        flow.load_engine().await.unwrap();
    }
    (flow, engine)
}

#[tokio::test]
async fn audio_round_trip_names_and_directives() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Nothing).await;
    let file = h.file("clip.mov", b"fake movie bytes");

    let delivery = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            bitrate: "128".into(),
            trim_start: "00:00:01".into(),
            trim_end: "".into(),
        })
        .await
        .unwrap();

    assert_eq!(delivery.file_name, "clip-mp3.mp3");
    assert_eq!(delivery.media_type, "audio/mp3");
    assert_eq!(std::fs::read(&delivery.path).unwrap(), b"fake movie bytes");
    assert_eq!(
        engine.runs.lock().unwrap()[0],
        vec!["-ss", "00:00:01", "-i", "clip.mov", "-b:a", "128k", "converted.mp3"]
    );
    assert_eq!(engine.unlink_count("clip.mov"), 1);
    assert_eq!(engine.unlink_count("converted.mp3"), 1);
    assert!(engine.files.lock().unwrap().is_empty());

    assert!(flow.trigger().is_enabled());
    assert_eq!(h.status.current().kind, StatusKind::Success);
    let messages = h.recorder.messages();
    assert!(messages.contains(&"Processing... 50%".to_string()));
    assert!(messages.contains(&"Processing... 100%".to_string()));
    assert_eq!(h.outputs(), vec!["clip-mp3.mp3"]);
}

#[tokio::test]
async fn audio_engine_failure_cleans_up_once_and_reenables() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Run).await;
    let file = h.file("song.wav", b"RIFF");

    let err = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "ogg".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Conversion(_)));
    assert!(flow.trigger().is_enabled());
    assert_eq!(engine.unlink_count("song.wav"), 1);
    assert_eq!(h.status.current().kind, StatusKind::Error);
    assert!(h.outputs().is_empty());
}

#[tokio::test]
async fn audio_cleanup_runs_even_when_staging_never_happened() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Write).await;
    let file = h.file("song.wav", b"RIFF");

    let err = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Conversion(_)));
    assert!(engine.runs.lock().unwrap().is_empty());
    assert_eq!(engine.unlink_count("song.wav"), 1);
    assert!(flow.trigger().is_enabled());
}

#[tokio::test]
async fn audio_unreadable_input_is_a_conversion_error() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Nothing).await;
    let missing = FileSelection::new(h.input_dir.join("gone.mp3"), None);

    let err = flow
        .convert(AudioRequest {
            file: Some(missing),
            format: "wav".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Conversion(_)));
    assert_eq!(engine.unlink_count("gone.mp3"), 1);
    assert!(flow.trigger().is_enabled());
}

#[tokio::test]
async fn audio_without_file_never_touches_the_engine() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Nothing).await;

    let err = flow
        .convert(AudioRequest {
            file: None,
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err, ConvertError::UserInput(UserInputError::NoFile));
    assert!(engine.runs.lock().unwrap().is_empty());
    assert!(engine.unlinks.lock().unwrap().is_empty());
    assert_eq!(h.status.current().kind, StatusKind::Error);
}

#[tokio::test]
async fn audio_rejects_text_files() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Nothing).await;
    let file = h.file("notes.txt", b"hello");

    let err = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::UserInput(UserInputError::UnsupportedMediaType { .. })
    ));
    assert!(engine.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn audio_engine_load_failure_keeps_flow_disabled() {
    let h = Harness::new();
    let (flow, engine) = loaded_audio(&h, FailAt::Load).await;
    assert!(!flow.is_enabled());

    let err = flow.load_engine().await.unwrap_err();
    assert!(matches!(err, ConvertError::EngineLoad(_)));
    assert!(!flow.is_enabled());
    assert_eq!(h.status.current().kind, StatusKind::Error);

    // No retry: a second load and a convert both report the stored failure.
    assert!(flow.load_engine().await.is_err());
    let file = h.file("song.wav", b"RIFF");
    let err = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::EngineLoad(_)));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    assert!(engine.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn audio_before_load_is_not_ready() {
    let h = Harness::new();
    let engine = FakeEngine::new(FailAt::Nothing);
    let flow = AudioFlow::new(
        EngineContext::new(engine.clone()),
        Arc::clone(&h.sink),
        Arc::clone(&h.status),
    );
    let file = h.file("song.wav", b"RIFF");

    let err = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err, ConvertError::UserInput(UserInputError::EngineNotReady));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn audio_flows_sharing_an_engine_see_its_load() {
    let h = Harness::new();
    let engine = FakeEngine::new(FailAt::Nothing);
    let ctx = EngineContext::new(engine.clone());
    let first = AudioFlow::new(ctx.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));
    let second = AudioFlow::new(ctx.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));
    assert!(!second.is_enabled());

    first.load_engine().await.unwrap();
    assert!(second.is_enabled());

    let file = h.file("song.wav", b"RIFF");
    let delivery = second
        .convert(AudioRequest {
            file: Some(file),
            format: "mp3".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(delivery.file_name, "song-mp3.mp3");
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn audio_flow_works_after_the_context_is_loaded_directly() {
    let h = Harness::new();
    let engine = FakeEngine::new(FailAt::Nothing);
    let ctx = EngineContext::new(engine.clone());
    let flow = AudioFlow::new(ctx.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));

    ctx.load().await.unwrap();
    assert!(flow.is_enabled());

    let file = h.file("clip.mov", b"moov");
    let delivery = flow
        .convert(AudioRequest {
            file: Some(file),
            format: "wav".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(delivery.file_name, "clip-wav.wav");
}

#[tokio::test]
async fn audio_second_click_while_running_is_busy() {
    let h = Harness::new();
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::gated(Arc::clone(&gate));
    let flow = AudioFlow::new(
        EngineContext::new(engine.clone()),
        Arc::clone(&h.sink),
        Arc::clone(&h.status),
    );
    flow.load_engine().await.unwrap();
    let request = AudioRequest {
        file: Some(h.file("song.wav", b"RIFF")),
        format: "mp3".into(),
        ..Default::default()
    };

    let running = flow.convert(request.clone());
    let overlapping = async {
        engine.entered.notified().await;
        assert!(!flow.is_enabled());
        let outcome = flow.convert(request.clone()).await;
        gate.notify_one();
        outcome
    };
    let (running, overlapping) = tokio::join!(running, overlapping);

    assert_eq!(
        overlapping.unwrap_err(),
        ConvertError::UserInput(UserInputError::Busy)
    );
    assert_eq!(running.unwrap().file_name, "song-mp3.mp3");
    assert_eq!(engine.runs.lock().unwrap().len(), 1);
    assert_eq!(engine.unlink_count("song.wav"), 1);
    assert!(flow.is_enabled());
}

#[tokio::test]
async fn image_resizes_and_renames() {
    let h = Harness::new();
    let rasterizer = Arc::new(CountingRasterizer::default());
    let flow = ImageFlow::new(rasterizer.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));
    let file = h.file("clip.png", &png_bytes(100, 50));

    let delivery = flow
        .convert(ImageRequest {
            file: Some(file),
            format: "image/webp".into(),
            quality: "".into(),
            width: "200".into(),
            height: "".into(),
        })
        .await
        .unwrap();

    assert_eq!(delivery.file_name, "clip.webp");
    assert_eq!(delivery.media_type, "image/webp");
    let written = std::fs::read(&delivery.path).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::WebP);
    let decoded = image::load_from_memory(&written).unwrap();
    assert_eq!(decoded.dimensions(), (200, 100));
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.status.current().message,
        "Conversion complete! clip.webp (200x100) is downloading."
    );
    assert!(flow.trigger().is_enabled());
}

#[tokio::test]
async fn image_both_dimensions_ignore_aspect() {
    let h = Harness::new();
    let flow = ImageFlow::new(Arc::new(ImageRasterizer), Arc::clone(&h.sink), Arc::clone(&h.status));
    let file = h.file("wide.png", &png_bytes(100, 50));

    let delivery = flow
        .convert(ImageRequest {
            file: Some(file),
            format: "jpg".into(),
            quality: "0.7".into(),
            width: "30".into(),
            height: "60".into(),
        })
        .await
        .unwrap();

    assert_eq!(delivery.file_name, "wide.jpg");
    let decoded = image::load_from_memory(&std::fs::read(&delivery.path).unwrap()).unwrap();
    assert_eq!(decoded.dimensions(), (30, 60));
}

#[tokio::test]
async fn image_rejects_text_without_rasterizing() {
    let h = Harness::new();
    let rasterizer = Arc::new(CountingRasterizer::default());
    let flow = ImageFlow::new(rasterizer.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));
    let path = h.input_dir.join("notes.txt");
    std::fs::write(&path, b"plain text").unwrap();
    let file = FileSelection::new(path, Some("text/plain"));

    let err = flow
        .convert(ImageRequest {
            file: Some(file),
            format: "image/png".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::UserInput(UserInputError::UnsupportedMediaType { .. })
    ));
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    assert!(h.outputs().is_empty());
    assert!(flow.trigger().is_enabled());
}

#[tokio::test]
async fn image_decode_failure_reports_and_reenables() {
    let h = Harness::new();
    let flow = ImageFlow::new(Arc::new(ImageRasterizer), Arc::clone(&h.sink), Arc::clone(&h.status));
    let file = h.file("broken.png", b"definitely not a png");

    let err = flow
        .convert(ImageRequest {
            file: Some(file),
            format: "image/png".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Conversion(_)));
    assert_eq!(h.status.current().kind, StatusKind::Error);
    assert!(h.status.current().message.starts_with("Error loading the image file"));
    assert!(flow.trigger().is_enabled());
    assert!(h.outputs().is_empty());
}

#[tokio::test]
async fn image_busy_trigger_blocks_a_second_click() {
    let h = Harness::new();
    let rasterizer = Arc::new(CountingRasterizer::default());
    let flow = ImageFlow::new(rasterizer.clone(), Arc::clone(&h.sink), Arc::clone(&h.status));
    let file = h.file("clip.png", &png_bytes(4, 4));

    let _held = flow.trigger().try_disable().unwrap();
    let err = flow
        .convert(ImageRequest {
            file: Some(file),
            format: "image/png".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err, ConvertError::UserInput(UserInputError::Busy));
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn archive_wraps_the_original_file() {
    let h = Harness::new();
    let flow = ArchiveFlow::new(Arc::clone(&h.sink), Arc::clone(&h.status));
    let file = h.file("report.pdf", b"%PDF-1.7 pretend");

    let delivery = flow
        .convert(ArchiveRequest { file: Some(file) })
        .await
        .unwrap();

    assert_eq!(delivery.file_name, "report.zip");
    assert_eq!(delivery.media_type, "application/zip");
    let bytes = std::fs::read(&delivery.path).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(zip.len(), 1);
    assert_eq!(zip.by_index(0).unwrap().name(), "report.pdf");
    assert_eq!(h.status.current().kind, StatusKind::Success);
}

#[tokio::test]
async fn archive_without_file() {
    let h = Harness::new();
    let flow = ArchiveFlow::new(Arc::clone(&h.sink), Arc::clone(&h.status));
    let err = flow.convert(ArchiveRequest { file: None }).await.unwrap_err();
    assert_eq!(err, ConvertError::UserInput(UserInputError::NoFile));
    assert!(!Path::new(&h.output_dir).exists());
}
