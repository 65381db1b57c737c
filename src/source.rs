//! Frame sources.
//!
//! A [`FrameSource`] hands out frames strictly in decode order, one per call
//! to [`read_next`](FrameSource::read_next), and returns `Ok(None)` once the
//! stream is exhausted. End of stream is not an error; a decode failure is.
//!
//! [`VideoSource`] decodes a video file through FFmpeg. [`MemorySource`]
//! serves pictures that are already in memory, which is handy for synthetic
//! streams and image sequences.
//!
//! # Example
//!
//! ```no_run
//! use scenecut::{FrameSource, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! println!("~{} frames", source.total_frames());
//! while let Some(frame) = source.read_next()? {
//!     println!("frame {} is {}x{}", frame.index(), frame.width(), frame.height());
//! }
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::DynamicImage;

use crate::{error::ScenecutError, frame::Frame};

/// A forward-only stream of decoded frames.
///
/// Implementations must yield frames with strictly increasing indices and
/// never skip one.
pub trait FrameSource {
    /// Total number of frames, or 0 when the source cannot tell.
    fn total_frames(&self) -> u64;

    /// Index the next frame will carry (equivalently, frames read so far).
    fn position(&self) -> u64;

    /// Read the next frame. `Ok(None)` means the stream ended normally.
    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError> {
        (**self).read_next()
    }
}

/// Frames decoded from a video file with FFmpeg.
///
/// Decoder and demuxer state are released when the value is dropped.
pub struct VideoSource {
    path: PathBuf,
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<(ScalingContext, (Pixel, u32, u32))>,
    video_stream_index: usize,
    time_base: Rational,
    total_frames: u64,
    position: u64,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    exhausted: bool,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("video_stream_index", &self.video_stream_index)
            .field("total_frames", &self.total_frames)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open `path` and prepare a decoder for its best video stream.
    ///
    /// Initializes FFmpeg (idempotent). Nothing is kept if any step fails.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::CannotOpenSource`] when the file cannot be
    /// opened, has no video stream, or its decoder cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScenecutError> {
        let path = path.as_ref().to_path_buf();
        let open_error = |reason: String| ScenecutError::CannotOpenSource {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| open_error("no video stream found".to_string()))?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| open_error(format!("failed to read codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| open_error(format!("failed to create video decoder: {error}")))?;

        let total_frames = estimate_frame_count(
            stream.frames(),
            input_context.duration(),
            stream.avg_frame_rate(),
        );

        log::debug!(
            "Video stream {} of {}: {}x{}, ~{} frames",
            video_stream_index,
            path.display(),
            decoder.width(),
            decoder.height(),
            total_frames,
        );

        Ok(Self {
            path,
            input_context,
            decoder,
            scaler: None,
            video_stream_index,
            time_base,
            total_frames,
            position: 0,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            exhausted: false,
        })
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convert the frame currently held in `decoded_frame` to RGB.
    ///
    /// The scaler is rebuilt whenever the decoder's output geometry or pixel
    /// format changes, so a resolution change surfaces as differently-sized
    /// frames rather than a scaler failure.
    fn convert_current_frame(&mut self) -> Result<Frame, ScenecutError> {
        let geometry = (
            self.decoded_frame.format(),
            self.decoded_frame.width(),
            self.decoded_frame.height(),
        );
        let (format, width, height) = geometry;

        let scaler = match self.scaler.take() {
            Some((scaler, current)) if current == geometry => scaler,
            _ => ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?,
        };
        let (scaler, _) = self.scaler.insert((scaler, geometry));
        scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;

        let image = crate::conversion::rgb24_to_image(&self.rgb_frame).ok_or_else(|| {
            ScenecutError::DecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;

        let mut frame = Frame::new(self.position, DynamicImage::ImageRgb8(image));
        if let Some(timestamp) = self
            .decoded_frame
            .timestamp()
            .or_else(|| self.decoded_frame.pts())
            .and_then(|pts| crate::conversion::pts_to_duration(pts, self.time_base))
        {
            frame = frame.with_timestamp(timestamp);
        }
        Ok(frame)
    }
}

impl FrameSource for VideoSource {
    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let frame = self.convert_current_frame()?;
                self.position += 1;
                return Ok(Some(frame));
            }

            if self.eof_sent {
                self.exhausted = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            ScenecutError::DecodeError(format!(
                                "packet after frame {} rejected: {error}",
                                self.position
                            ))
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    return Err(ScenecutError::DecodeError(format!(
                        "failed to read packet after frame {}: {error}",
                        self.position
                    )));
                }
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        log::debug!(
            "Releasing video source {} after {} frame(s)",
            self.path.display(),
            self.position
        );
    }
}

/// Work out the frame count from the container, falling back to
/// duration × frame rate. Returns 0 when neither is known.
fn estimate_frame_count(stream_frames: i64, duration_microseconds: i64, rate: Rational) -> u64 {
    if stream_frames > 0 {
        return stream_frames as u64;
    }
    if duration_microseconds <= 0 || rate.denominator() == 0 || rate.numerator() <= 0 {
        return 0;
    }
    let frames_per_second = f64::from(rate.numerator()) / f64::from(rate.denominator());
    (duration_microseconds as f64 / 1_000_000.0 * frames_per_second).round() as u64
}

/// Frames served from pictures already held in memory.
///
/// # Example
///
/// ```
/// use image::DynamicImage;
/// use scenecut::{FrameSource, MemorySource};
///
/// let black = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
/// let mut source = MemorySource::new(vec![black.clone(), black]);
/// assert_eq!(source.total_frames(), 2);
/// assert_eq!(source.read_next()?.map(|frame| frame.index()), Some(0));
/// # Ok::<(), scenecut::ScenecutError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: VecDeque<DynamicImage>,
    total_frames: u64,
    position: u64,
}

impl MemorySource {
    /// Serve `frames` in order.
    pub fn new(frames: Vec<DynamicImage>) -> Self {
        let total_frames = frames.len() as u64;
        Self {
            frames: frames.into(),
            total_frames,
            position: 0,
        }
    }

    /// Override the reported frame count, e.g. 0 to mimic a container that
    /// does not know its length.
    #[must_use]
    pub fn with_reported_total(mut self, total_frames: u64) -> Self {
        self.total_frames = total_frames;
        self
    }
}

impl FrameSource for MemorySource {
    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError> {
        Ok(self.frames.pop_front().map(|image| {
            let frame = Frame::new(self.position, image);
            self.position += 1;
            frame
        }))
    }
}
