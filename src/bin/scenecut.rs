use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use scenecut::{
    BatchQueue, DEFAULT_CHANGE_THRESHOLD, DecodeErrorPolicy, DetectionConfig, DetectionJob,
    FfmpegLogLevel, JobReport, JobState, KeyframeFormat, ProgressInfo, ProgressReporter,
    ShotBoundary, discovery,
};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  scenecut detect movie.mp4 --out shots --threshold 40 --progress\n  scenecut batch ~/videos --out shots --format png --json\n  scenecut completions zsh > _scenecut";

#[derive(Debug, Parser)]
#[command(
    name = "scenecut",
    version,
    about = "Detect shot boundaries in videos and export one keyframe per shot",
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
    /// More logging output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Show a progress bar for the video being processed.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, verbose, debug).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct DetectionOptions {
    /// Output root; keyframes go to <out>/Output_<video>/.
    #[arg(long)]
    out: PathBuf,

    /// Percentage (0-100) of changed pixels that marks a new shot.
    #[arg(long, default_value_t = DEFAULT_CHANGE_THRESHOLD)]
    threshold: f64,

    /// Keyframe image format (jpg, png, bmp, tiff, webp).
    #[arg(long, default_value = "jpg")]
    format: String,

    /// What a decode error after the first frame does (truncate, fail).
    #[arg(long, default_value = "truncate")]
    on_decode_error: String,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect shots in a single video.
    #[command(
        about = "Detect shots in one video",
        after_help = "Examples:\n  scenecut detect movie.mp4 --out shots\n  scenecut detect movie.mp4 --out shots --threshold 35 --format png --json"
    )]
    Detect {
        /// Video file to analyse.
        input: PathBuf,

        #[command(flatten)]
        options: DetectionOptions,
    },

    /// Detect shots in every video below a directory, one video at a time.
    #[command(
        about = "Detect shots in a directory tree",
        after_help = "Examples:\n  scenecut batch ~/videos --out shots\n  scenecut batch ~/videos --out shots --on-decode-error fail --progress"
    )]
    Batch {
        /// Directory searched recursively for videos.
        root: PathBuf,

        #[command(flatten)]
        options: DetectionOptions,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_keyframe_format(value: &str) -> Option<KeyframeFormat> {
    KeyframeFormat::from_extension(value)
}

fn parse_decode_error_policy(value: &str) -> Option<DecodeErrorPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "truncate" | "stop" => Some(DecodeErrorPolicy::Truncate),
        "fail" | "error" => Some(DecodeErrorPolicy::Fail),
        _ => None,
    }
}

fn log_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn Error>> {
    let filter = log_filter(global.verbose);
    scenecut::init_logging(filter);

    let ffmpeg_level = match &global.ffmpeg_log_level {
        Some(level) => level
            .parse::<FfmpegLogLevel>()
            .map_err(|_| format!("unsupported --ffmpeg-log-level: {level}"))?,
        None => FfmpegLogLevel::for_filter(filter),
    };
    scenecut::set_ffmpeg_log_level(ffmpeg_level);
    Ok(())
}

impl DetectionOptions {
    fn config_for(&self, input: &Path) -> Result<DetectionConfig, Box<dyn Error>> {
        let format = parse_keyframe_format(&self.format)
            .ok_or_else(|| format!("unsupported --format: {}", self.format))?;
        let policy = parse_decode_error_policy(&self.on_decode_error)
            .ok_or_else(|| format!("unsupported --on-decode-error: {}", self.on_decode_error))?;

        let config = DetectionConfig::new(input, &self.out)
            .with_change_threshold(self.threshold)
            .with_keyframe_format(format)
            .with_decode_error_policy(policy);
        config.validate()?;
        Ok(config)
    }
}

fn progress_bar() -> Result<ProgressBar, Box<dyn Error>> {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} {bar:40.cyan/blue} {pos:>3}% ({elapsed})",
    )?;
    bar.set_style(style.progress_chars("##-"));
    Ok(bar)
}

/// Drives a bar shared by every job of a run. The bar is re-labelled when
/// a job reports its first progress, so jobs that never start never draw.
struct TerminalProgress {
    bar: ProgressBar,
    label: String,
    started: AtomicBool,
}

impl TerminalProgress {
    fn new(bar: &ProgressBar, label: String) -> Self {
        Self {
            bar: bar.clone(),
            label,
            started: AtomicBool::new(false),
        }
    }
}

impl ProgressReporter for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if !self.started.swap(true, Ordering::Relaxed) {
            self.bar.reset();
            self.bar.set_message(self.label.clone());
        }
        self.bar.set_position(info.percentage as u64);
    }

    fn on_keyframe(&self, boundary: &ShotBoundary) {
        self.bar.println(format!(
            "{} frame {} -> {}",
            "cut".cyan().bold(),
            boundary.frame_index,
            boundary.path.display()
        ));
    }
}

fn progress_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn report_json(report: &JobReport) -> Value {
    json!({
        "job_id": report.job_id,
        "input": report.input_path.display().to_string(),
        "output_directory": report.output_directory.display().to_string(),
        "state": report.state.to_string(),
        "frames_processed": report.frames_processed,
        "total_frames": report.total_frames,
        "elapsed_seconds": report.elapsed.as_secs_f64(),
        "error": report.error,
        "boundaries": report.boundaries.iter().map(|boundary| json!({
            "frame": boundary.frame_index,
            "timestamp_seconds": boundary.timestamp.map(|timestamp| timestamp.as_secs_f64()),
            "change_percentage": boundary.change_percentage,
            "path": boundary.path.display().to_string(),
        })).collect::<Vec<_>>(),
    })
}

fn print_report(report: &JobReport) {
    let input = report.input_path.display();
    match report.state {
        JobState::Completed if report.is_truncated() => println!(
            "{} {input}: {} keyframe(s) before a decode error: {}",
            "truncated:".yellow().bold(),
            report.boundaries.len(),
            report.error.as_deref().unwrap_or_default()
        ),
        JobState::Completed => println!(
            "{} {input}: {} keyframe(s) from {} frame(s) in {}",
            "success:".green().bold(),
            report.boundaries.len(),
            report.frames_processed,
            report.output_directory.display()
        ),
        JobState::Cancelled => println!(
            "{} {input} after {} frame(s)",
            "cancelled:".yellow().bold(),
            report.frames_processed
        ),
        _ => println!(
            "{} {input}: {}",
            "failed:".red().bold(),
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { input, options } => {
            apply_global_options(&cli.global)?;
            let job = DetectionJob::new(options.config_for(&input)?)?;
            let handle = job.handle();
            let bar = cli.global.progress.then(progress_bar).transpose()?;
            if let Some(bar) = &bar {
                handle.subscribe(Arc::new(TerminalProgress::new(bar, progress_label(&input))));
            }

            let interrupt = handle.clone();
            ctrlc::set_handler(move || {
                eprintln!("\n{}", "interrupted, stopping after the current frame".yellow());
                interrupt.cancel();
            })?;

            let report = job.spawn()?.wait();
            if let Some(bar) = &bar {
                bar.finish_and_clear();
            }
            if options.json {
                println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
            } else {
                print_report(&report);
            }

            if report.state == JobState::Failed {
                return Err(format!("detection failed for {}", input.display()).into());
            }
        }
        Commands::Batch { root, options } => {
            apply_global_options(&cli.global)?;
            let template = options.config_for(&root)?;
            let plan = discovery::plan_batch(&root, &options.out, &template)?;
            if plan.is_empty() {
                println!(
                    "{} no videos found under {}",
                    "warning:".yellow().bold(),
                    root.display()
                );
                return Ok(());
            }

            let queue = BatchQueue::new();
            let bar = cli.global.progress.then(progress_bar).transpose()?;
            for config in plan {
                let label = progress_label(config.input_path());
                let handle = queue.enqueue_config(config)?;
                if let Some(bar) = &bar {
                    handle.subscribe(Arc::new(TerminalProgress::new(bar, label)));
                }
            }

            let interrupt = queue.clone();
            ctrlc::set_handler(move || {
                eprintln!("\n{}", "interrupted, cancelling the batch".yellow());
                interrupt.cancel_all();
            })?;

            let report = queue.run_all()?.wait();
            if let Some(bar) = &bar {
                bar.finish_and_clear();
            }
            if options.json {
                let payload = json!({
                    "cancelled": report.cancelled,
                    "elapsed_seconds": report.elapsed.as_secs_f64(),
                    "jobs": report.jobs.iter().map(report_json).collect::<Vec<_>>(),
                    "discarded": report.discarded.iter().map(report_json).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                report.jobs.iter().for_each(print_report);
                println!(
                    "{} {} completed, {} failed, {} cancelled, {} keyframe(s) in {:.1?}",
                    "batch:".bold(),
                    report.count(JobState::Completed),
                    report.count(JobState::Failed),
                    report.count(JobState::Cancelled),
                    report.keyframes(),
                    report.elapsed
                );
            }

            let failed = report.count(JobState::Failed);
            if failed > 0 {
                return Err(format!("{failed} video(s) failed").into());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "scenecut", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    fn progress_at(job_id: u64, percentage: f32) -> ProgressInfo {
        ProgressInfo {
            job_id,
            current_frame: 0,
            total_frames: Some(100),
            percentage,
            keyframes: 0,
            elapsed: std::time::Duration::ZERO,
            estimated_remaining: None,
        }
    }

    #[test]
    fn shared_bar_follows_the_job_that_reports() {
        let bar = ProgressBar::hidden();
        let first = TerminalProgress::new(&bar, "a.mp4".to_string());
        let discarded = TerminalProgress::new(&bar, "b.mp4".to_string());
        let last = TerminalProgress::new(&bar, "c.mp4".to_string());

        first.on_progress(&progress_at(1, 40.0));
        first.on_progress(&progress_at(1, 100.0));
        assert_eq!(bar.message(), "a.mp4");
        assert_eq!(bar.position(), 100);

        discarded.on_finish(&JobReport {
            job_id: 2,
            input_path: PathBuf::from("b.mp4"),
            output_directory: PathBuf::from("out/Output_b"),
            state: JobState::Cancelled,
            boundaries: Vec::new(),
            frames_processed: 0,
            total_frames: 0,
            error: None,
            elapsed: std::time::Duration::ZERO,
        });
        assert_eq!(bar.message(), "a.mp4");

        last.on_progress(&progress_at(3, 5.0));
        assert_eq!(bar.message(), "c.mp4");
        assert_eq!(bar.position(), 5);
    }

    #[test]
    fn parse_keyframe_format_aliases() {
        assert_eq!(parse_keyframe_format("jpg"), Some(KeyframeFormat::Jpeg));
        assert_eq!(parse_keyframe_format("JPEG"), Some(KeyframeFormat::Jpeg));
        assert_eq!(parse_keyframe_format("png"), Some(KeyframeFormat::Png));
        assert_eq!(parse_keyframe_format("gif"), None);
    }

    #[test]
    fn parse_decode_error_policy_aliases() {
        assert_eq!(
            parse_decode_error_policy("Truncate"),
            Some(DecodeErrorPolicy::Truncate)
        );
        assert_eq!(parse_decode_error_policy("fail"), Some(DecodeErrorPolicy::Fail));
        assert_eq!(parse_decode_error_policy("ignore"), None);
    }

    #[test]
    fn verbosity_maps_to_log_filter() {
        assert_eq!(log_filter(0), LevelFilter::Warn);
        assert_eq!(log_filter(1), LevelFilter::Info);
        assert_eq!(log_filter(2), LevelFilter::Debug);
        assert_eq!(log_filter(9), LevelFilter::Trace);
    }

    #[test]
    fn detect_arguments_build_a_config() {
        let cli = Cli::try_parse_from([
            "scenecut",
            "detect",
            "movie.mp4",
            "--out",
            "shots",
            "--threshold",
            "35",
            "--format",
            "png",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);

        let Commands::Detect { input, options } = cli.command else {
            panic!("expected the detect command");
        };
        let config = options.config_for(&input).unwrap();
        assert_eq!(config.change_threshold(), 35.0);
        assert_eq!(config.keyframe_format(), KeyframeFormat::Png);
        assert_eq!(config.output_root(), Path::new("shots"));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let options = DetectionOptions {
            out: PathBuf::from("shots"),
            threshold: 120.0,
            format: "jpg".to_string(),
            on_decode_error: "truncate".to_string(),
            json: false,
        };
        assert!(options.config_for(Path::new("movie.mp4")).is_err());
    }
}
