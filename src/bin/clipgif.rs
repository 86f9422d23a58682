use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use clipgif::{
    ClipWindow, ConversionContext, ConversionOptions, ConversionOutput, ConversionPhase,
    DEFAULT_FPS, DEFAULT_QUALITY, FfmpegMediaSource, GifSink, MediaSource, ProgressCallback,
    ProgressInfo, SizePreset, SoftwareSurface, Strategy, WorkerMode, format_time, parse_time,
};
use colored::Colorize;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  clipgif convert input.mp4 --out clip.gif --start 00:00:10 --end 00:00:14\n  clipgif convert input.mp4 --out small.gif --size small --fps 10 --progress\n  clipgif probe input.mp4 --json\n  clipgif completions zsh > _clipgif";

#[derive(Debug, Parser)]
#[command(
    name = "clipgif",
    version,
    about = "Turn a window of a video into an animated GIF",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output (including FFmpeg's own messages).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a clip window of a video into a GIF.
    #[command(
        about = "Convert a clip window into a GIF",
        after_help = "Examples:\n  clipgif convert input.mp4 --out clip.gif\n  clipgif convert input.mp4 --out clip.gif --start 00:01:00 --end 00:01:03 --mode seek"
    )]
    Convert(ConvertArgs),

    /// Print what the converter sees in a video.
    #[command(
        about = "Print video duration, size and default clip window",
        visible_alias = "info"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input video path.
    input: PathBuf,
    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,
    /// Clip start (HH:MM:SS). Defaults to the start of the video.
    #[arg(long)]
    start: Option<String>,
    /// Clip end (HH:MM:SS). Defaults to the end of the video, or to the first
    /// five seconds when --start is omitted too.
    #[arg(long)]
    end: Option<String>,
    /// Frames sampled per second of video.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,
    /// Output size: small | medium | large | original.
    #[arg(long, default_value = "medium")]
    size: String,
    /// Quantizer quality, 1 (best) to 30 (fastest).
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=30))]
    quality: u8,
    /// Playback speed used while extracting, 1 to 8.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    /// Play the GIF once instead of looping.
    #[arg(long)]
    no_loop: bool,
    /// Sampling strategy: auto | playback | seek.
    #[arg(long, default_value = "auto")]
    mode: String,
    /// Seconds to wait for a single seek before giving up.
    #[arg(long)]
    seek_timeout: Option<f64>,
    /// Encoder worker threads (0 encodes inline).
    #[arg(long)]
    workers: Option<usize>,
    /// Print the result as machine-readable JSON.
    #[arg(long)]
    json: bool,
}

fn parse_size(value: &str) -> Option<SizePreset> {
    match value.to_ascii_lowercase().as_str() {
        "small" | "s" => Some(SizePreset::Small),
        "medium" | "m" => Some(SizePreset::Medium),
        "large" | "l" => Some(SizePreset::Large),
        "original" | "source" => Some(SizePreset::Original),
        _ => None,
    }
}

fn parse_mode(value: &str) -> Option<Vec<Strategy>> {
    match value.to_ascii_lowercase().as_str() {
        "auto" => Some(vec![Strategy::Playback, Strategy::Seek]),
        "playback" | "play" => Some(vec![Strategy::Playback]),
        "seek" => Some(vec![Strategy::Seek]),
        _ => None,
    }
}

fn parse_workers(value: Option<usize>) -> WorkerMode {
    match value {
        None => WorkerMode::Auto,
        Some(0) => WorkerMode::Inline,
        Some(count) => WorkerMode::Threads(count),
    }
}

fn parse_seek_timeout(value: f64) -> Result<Duration, Box<dyn Error>> {
    if !value.is_finite() || value <= 0.0 {
        return Err(
            format!("--seek-timeout must be a positive number of seconds, got {value}").into(),
        );
    }
    Ok(Duration::from_secs_f64(value))
}

fn check_timecode(flag: &str, value: Option<&str>) -> Result<(), Box<dyn Error>> {
    match value {
        Some(text) if parse_time(text).is_none() => {
            Err(format!("{flag} must be HH:MM:SS, got {text:?}").into())
        }
        _ => Ok(()),
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    clipgif::set_ffmpeg_verbose(verbose);
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.percent.round() as u64);
        match info.phase {
            ConversionPhase::Finished => self.bar.finish_with_message(info.message.clone()),
            ConversionPhase::Failed => self.bar.abandon_with_message(info.message.clone()),
            _ => self.bar.set_message(info.message.clone()),
        }
    }
}

fn build_options(
    args: &ConvertArgs,
    global: &GlobalOptions,
) -> Result<ConversionOptions, Box<dyn Error>> {
    let size = parse_size(&args.size).ok_or(format!("unsupported --size: {}", args.size))?;
    let strategies = parse_mode(&args.mode).ok_or(format!("unsupported --mode: {}", args.mode))?;
    if args.fps == 0 {
        return Err("--fps must be greater than 0".into());
    }
    if !(1.0..=8.0).contains(&args.speed) {
        return Err(format!("--speed must be between 1 and 8, got {}", args.speed).into());
    }

    let mut options = ConversionOptions::new()
        .with_fps(args.fps)
        .with_size(size)
        .with_quality(args.quality)
        .with_speed(args.speed)
        .with_loop(!args.no_loop)
        .with_strategies(strategies)
        .with_workers(parse_workers(args.workers));
    if let Some(seconds) = args.seek_timeout {
        options = options.with_seek_timeout(parse_seek_timeout(seconds)?);
    }
    if global.progress {
        options = options.with_progress(Arc::new(TerminalProgress::new()?));
    }
    Ok(options)
}

fn print_output(
    args: &ConvertArgs,
    window: Option<ClipWindow>,
    output: &ConversionOutput,
) -> Result<(), Box<dyn Error>> {
    if args.json {
        let payload = json!({
            "output": args.out.display().to_string(),
            "bytes": output.len(),
            "size": output.human_size(),
            "width": output.width,
            "height": output.height,
            "frames": output.frame_count,
            "strategy": output.strategy.to_string(),
            "start_seconds": window.map(|clip| clip.start()),
            "end_seconds": window.map(|clip| clip.end()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "{} {} ({}x{}, {} frames, {}, {} strategy)",
            "saved".green().bold(),
            args.out.display(),
            output.width,
            output.height,
            output.frame_count,
            output.human_size(),
            output.strategy,
        );
    }
    Ok(())
}

fn convert(args: ConvertArgs, global: &GlobalOptions) -> Result<(), Box<dyn Error>> {
    check_timecode("--start", args.start.as_deref())?;
    check_timecode("--end", args.end.as_deref())?;
    ensure_writable_path(&args.out, global.overwrite)?;
    let options = build_options(&args, global)?;

    let mut source = FfmpegMediaSource::open(&args.input)?;
    let mut context = ConversionContext::new(options);
    let window = match (args.start.as_deref(), args.end.as_deref()) {
        (None, None) => context.load_metadata(source.duration())?,
        (start, end) => context.set_window(start, end, source.duration())?,
    };
    if global.verbose {
        eprintln!(
            "{} {} → {}",
            "clip".cyan().bold(),
            format_time(window.start()),
            format_time(window.end())
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let flag = context.flag();
    let output = runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.cancel();
            }
        });
        context
            .convert(&mut source, &mut SoftwareSurface::new(), &mut GifSink::new)
            .await
    })?;

    output.save(&args.out)?;
    print_output(&args, context.window(), &output)
}

fn probe(input: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let source = FfmpegMediaSource::open(input)?;
    let duration = source.duration();
    let window = ClipWindow::default_for(duration).ok();
    let dimensions = source.video_dimensions();

    if json {
        let payload = json!({
            "path": source.path().display().to_string(),
            "duration_seconds": duration,
            "codec": source.codec(),
            "fps": source.frame_rate(),
            "width": dimensions.map(|(width, _)| width),
            "height": dimensions.map(|(_, height)| height),
            "default_window": window.map(|clip| json!({
                "start_seconds": clip.start(),
                "end_seconds": clip.end(),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Duration: {} ({duration:.3}s)", format_time(duration));
        match dimensions {
            Some((width, height)) => println!(
                "Video: {width}x{height} @ {:.2} fps [{}]",
                source.frame_rate(),
                source.codec()
            ),
            None => println!("Video: size unknown [{}]", source.codec()),
        }
        if let Some(clip) = window {
            println!(
                "Default clip: {} → {}",
                format_time(clip.start()),
                format_time(clip.end())
            );
        }
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Convert(args) => convert(args, &cli.global)?,
        Commands::Probe { input, json } => probe(&input, json)?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "clipgif", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
