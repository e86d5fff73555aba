// converter/src/main.rs
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{debug, error, info};

use converter::config::Config;
use converter::download::Delivery;
use converter::job::{ArchiveRequest, AudioRequest, ImageRequest, Job, parse_job_from_json};
use converter::media::FileSelection;
use converter::status::PresentationStyle;
use converter::{Converters, init_logging};

#[derive(Parser, Debug)]
#[command(name = "converter", version, about = "Convert audio, images and archives locally")]
struct Cli {
    /// Where results are saved [env: CONVERTER_OUTPUT_DIR]
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// ffmpeg binary [env: CONVERTER_FFMPEG_PATH]
    #[arg(long, global = true)]
    ffmpeg: Option<String>,

    /// Status line style: plain or ansi [env: CONVERTER_STATUS_STYLE]
    #[arg(long, global = true)]
    style: Option<PresentationStyle>,

    /// Print the saved result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcode or trim an audio file through ffmpeg
    Audio(AudioArgs),
    /// Re-encode and resize an image
    Image(ImageArgs),
    /// Wrap a file into a zip archive
    Archive(ArchiveArgs),
    /// Run a conversion described by a JSON job file
    Job { path: PathBuf },
}

#[derive(Args, Debug)]
struct AudioArgs {
    input: Option<PathBuf>,
    #[arg(long, default_value = "mp3")]
    format: String,
    /// Bitrate in kbit/s
    #[arg(long, default_value = "")]
    bitrate: String,
    #[arg(long, default_value = "")]
    trim_start: String,
    #[arg(long, default_value = "")]
    trim_end: String,
    /// Declared media type; guessed from the extension when omitted
    #[arg(long)]
    media_type: Option<String>,
}

#[derive(Args, Debug)]
struct ImageArgs {
    input: Option<PathBuf>,
    /// MIME type or extension
    #[arg(long, default_value = "image/png")]
    format: String,
    /// Encoder quality between 0 and 1
    #[arg(long, default_value = "")]
    quality: String,
    #[arg(long, default_value = "")]
    width: String,
    #[arg(long, default_value = "")]
    height: String,
    #[arg(long)]
    media_type: Option<String>,
}

#[derive(Args, Debug)]
struct ArchiveArgs {
    input: Option<PathBuf>,
    #[arg(long)]
    media_type: Option<String>,
}

fn selection(input: Option<PathBuf>, media_type: Option<String>) -> Option<FileSelection> {
    input.map(|path| FileSelection::new(path, media_type.as_deref()))
}

impl Command {
    fn into_job(self) -> Result<Job, Box<dyn Error>> {
        Ok(match self {
            Command::Audio(args) => Job::Audio(AudioRequest {
                file: selection(args.input, args.media_type),
                format: args.format,
                bitrate: args.bitrate,
                trim_start: args.trim_start,
                trim_end: args.trim_end,
            }),
            Command::Image(args) => Job::Image(ImageRequest {
                file: selection(args.input, args.media_type),
                format: args.format,
                quality: args.quality,
                width: args.width,
                height: args.height,
            }),
            Command::Archive(args) => Job::Archive(ArchiveRequest {
                file: selection(args.input, args.media_type),
            }),
            Command::Job { path } => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read job file {:?}: {}", path, e))?;
                parse_job_from_json(&raw)?
            }
        })
    }
}

async fn run(cli: Cli) -> Result<Delivery, Box<dyn Error>> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(ffmpeg) = cli.ffmpeg {
        config.ffmpeg_path = ffmpeg;
    }
    if let Some(style) = cli.style {
        config.status_style = style;
    }
    debug!("Config: {:?}", config);

    let job = cli.command.into_job()?;
    info!("Running {} job", job.kind());

    let converters = Converters::from_config(&config);
    let delivery = match job {
        Job::Audio(request) => {
            converters.audio.load_engine().await?;
            converters.audio.convert(request).await?
        }
        Job::Image(request) => converters.image.convert(request).await?,
        Job::Archive(request) => converters.archive.convert(request).await?,
    };
    Ok(delivery)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("info");

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(delivery) => {
            if json {
                match serde_json::to_string_pretty(&delivery) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        error!("Failed to serialize result: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", delivery.path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
