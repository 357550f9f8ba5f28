use std::{path::PathBuf, process::ExitCode};

use animorph::{
    AnimResult, Animator, Fps, GenerateReport, IdentityInference, InferenceService,
    LoggingConfig, MotionMode, PipelineConfig, ProcessInference, TargetShape,
};
use clap::Parser;

const DEFAULT_SOURCE: &str = "static/source.jpg";
const DEFAULT_DRIVING: &str = "static/driving.mp4";
const DEFAULT_OUTPUT: &str = "static/generated_video.mp4";

/// Animate a still image with the motion of a driving video.
#[derive(Parser, Debug)]
#[command(name = "animorph", version)]
struct Cli {
    /// Source image to animate (defaults to static/source.jpg).
    #[arg(requires = "driving_video_path")]
    source_image_path: Option<PathBuf>,

    /// Driving video providing the motion (defaults to static/driving.mp4).
    driving_video_path: Option<PathBuf>,

    /// Output MP4 path.
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    out: PathBuf,

    /// Pipeline config JSON; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Square model resolution in pixels.
    #[arg(long)]
    size: Option<u32>,

    /// Resample the driving clip to this many frames.
    #[arg(long)]
    sync_frames: Option<usize>,

    /// Use absolute instead of relative motion transfer.
    #[arg(long)]
    absolute: bool,

    /// External model program speaking the raw f32 stdio protocol.
    #[arg(long)]
    model_cmd: Option<PathBuf>,

    /// Argument passed to the model program (repeatable), e.g. config or checkpoint paths.
    #[arg(long = "model-arg", allow_hyphen_values = true)]
    model_args: Vec<String>,

    /// Log level filter; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    match run(cli) {
        Ok(report) => {
            eprintln!(
                "wrote {} ({} frames @ {} fps)",
                report.output_path.display(),
                report.output_frames,
                report.fps.as_f64()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(u8::try_from(err.kind().exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> AnimResult<GenerateReport> {
    let config = build_config(&cli)?;

    let (source, driving) = match (cli.source_image_path, cli.driving_video_path) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            tracing::warn!(
                source = DEFAULT_SOURCE,
                driving = DEFAULT_DRIVING,
                "no input paths given, using defaults"
            );
            (PathBuf::from(DEFAULT_SOURCE), PathBuf::from(DEFAULT_DRIVING))
        }
    };

    let mut service: Box<dyn InferenceService> = match cli.model_cmd {
        Some(program) => Box::new(ProcessInference::new(program).args(cli.model_args)),
        None => {
            tracing::warn!(
                "no --model-cmd given, using the identity model (output mirrors the driving video)"
            );
            Box::new(IdentityInference)
        }
    };

    let mut animator = Animator::new(config, service.as_mut())?;
    animator.generate(&source, &driving, &cli.out)
}

fn build_config(cli: &Cli) -> AnimResult<PipelineConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(fps) = cli.fps {
        config.fps = Fps::new(fps, 1)?;
    }
    if let Some(size) = cli.size {
        config.target = TargetShape::square(size)?;
    }
    if let Some(n) = cli.sync_frames {
        config.sync_frames = Some(n);
    }
    if cli.absolute {
        config.mode = MotionMode::Absolute;
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}
