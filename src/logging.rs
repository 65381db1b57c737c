//! Logging setup.
//!
//! The crate reports through the [`log`] facade: job lifecycle and accepted
//! boundaries at `info`, discarded or truncated work at `warn`, source and
//! export details at `debug`, per-frame measurements at `trace`.
//!
//! FFmpeg writes its own diagnostics straight to stderr. [`FfmpegLogLevel`]
//! tunes that output without importing `ffmpeg-next`, and
//! [`FfmpegLogLevel::for_filter`] derives a level that matches the verbosity
//! chosen for the Rust side.
//!
//! # Example
//!
//! ```no_run
//! use log::LevelFilter;
//! use scenecut::FfmpegLogLevel;
//!
//! scenecut::init_logging(LevelFilter::Info);
//! scenecut::set_ffmpeg_log_level(FfmpegLogLevel::for_filter(LevelFilter::Info));
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Write,
    str::FromStr,
};

use colored::Colorize;
use ffmpeg_next::util::log::Level;
use log::LevelFilter;

use crate::error::ScenecutError;

/// Verbosity of FFmpeg's own console output, quietest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Nothing at all.
    Quiet,
    /// Only errors that abort the process.
    Fatal,
    /// Recoverable errors, such as corrupt packets.
    Error,
    /// Warnings. FFmpeg's own default is more verbose than this.
    Warning,
    /// Stream information printed while opening inputs.
    Info,
    /// Detailed informational messages.
    Verbose,
    /// Decoder debugging output.
    Debug,
}

impl FfmpegLogLevel {
    /// Every level, quietest first.
    pub const ALL: [FfmpegLogLevel; 7] = [
        FfmpegLogLevel::Quiet,
        FfmpegLogLevel::Fatal,
        FfmpegLogLevel::Error,
        FfmpegLogLevel::Warning,
        FfmpegLogLevel::Info,
        FfmpegLogLevel::Verbose,
        FfmpegLogLevel::Debug,
    ];

    /// FFmpeg level to use alongside a Rust logger filtered at `filter`.
    ///
    /// FFmpeg stays one step quieter than the Rust side, so its warnings
    /// only appear once `info` logging is on.
    pub fn for_filter(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::Off => FfmpegLogLevel::Quiet,
            LevelFilter::Error | LevelFilter::Warn => FfmpegLogLevel::Error,
            LevelFilter::Info => FfmpegLogLevel::Warning,
            LevelFilter::Debug => FfmpegLogLevel::Info,
            LevelFilter::Trace => FfmpegLogLevel::Debug,
        }
    }

    /// Lower-case name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
        }
    }

    fn to_ffmpeg(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    fn from_ffmpeg(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic | Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug | Level::Trace => FfmpegLogLevel::Debug,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = ScenecutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        if value == "warn" {
            return Ok(FfmpegLogLevel::Warning);
        }
        FfmpegLogLevel::ALL
            .into_iter()
            .find(|level| level.name() == value)
            .ok_or_else(|| {
                ScenecutError::InvalidConfiguration(format!("unknown FFmpeg log level '{value}'"))
            })
    }
}

/// Set FFmpeg's console verbosity. Does not affect the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg());
}

/// Current FFmpeg console verbosity, if FFmpeg reports a known level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg)
}

/// Install an `env_logger` writing to stderr at `level`.
///
/// `RUST_LOG`, when set, overrides `level`. Calling this more than once is
/// harmless; later calls are ignored.
pub fn init_logging(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let label = match record.level() {
                log::Level::Error => "ERROR".bright_red(),
                log::Level::Warn => "WARN ".yellow(),
                log::Level::Info => "INFO ".green(),
                log::Level::Debug => "DEBUG".blue(),
                log::Level::Trace => "TRACE".magenta(),
            };
            writeln!(buf, "{} {label} {}", buf.timestamp(), record.args())
        })
        .try_init();

    if result.is_ok() {
        log::debug!("Logger initialised at {level}");
    }
}
