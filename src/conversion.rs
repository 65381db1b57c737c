//! Internal helpers for turning FFmpeg frames into image buffers.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::RgbImage;

/// Build an [`RgbImage`] from an FFmpeg frame already scaled to RGB24.
///
/// Row padding (stride beyond `width × 3`) is skipped. `None` when the plane
/// holds fewer rows than the frame claims.
pub(crate) fn rgb24_to_image(video_frame: &VideoFrame) -> Option<RgbImage> {
    let (width, height) = (video_frame.width(), video_frame.height());
    let row_length = width as usize * 3;
    let stride = video_frame.stride(0).max(row_length);
    if row_length == 0 {
        return RgbImage::from_raw(width, height, Vec::new());
    }

    let pixels: Vec<u8> = video_frame
        .data(0)
        .chunks(stride)
        .take(height as usize)
        .filter(|row| row.len() >= row_length)
        .flat_map(|row| &row[..row_length])
        .copied()
        .collect();
    RgbImage::from_raw(width, height, pixels)
}

/// Convert a PTS in the stream's time base to a [`Duration`].
///
/// Negative timestamps (pre-roll) clamp to zero.
pub(crate) fn pts_to_duration(pts: i64, time_base: Rational) -> Option<Duration> {
    if time_base.denominator() == 0 {
        return None;
    }
    let seconds =
        pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator());
    if seconds.is_finite() {
        Some(Duration::from_secs_f64(seconds.max(0.0)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_next::format::Pixel;

    #[test]
    fn padded_rows_are_skipped() {
        let mut frame = VideoFrame::new(Pixel::RGB24, 3, 2);
        let stride = frame.stride(0);
        for y in 0..2 {
            for x in 0..3 {
                let offset = y * stride + x * 3;
                frame.data_mut(0)[offset..offset + 3].copy_from_slice(&[x as u8, y as u8, 7]);
            }
        }

        let image = rgb24_to_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 7]);
        assert_eq!(image.get_pixel(2, 1).0, [2, 1, 7]);
    }

    #[test]
    fn pts_uses_the_time_base() {
        assert_eq!(
            pts_to_duration(50, Rational::new(1, 25)),
            Some(Duration::from_secs(2))
        );
        assert_eq!(pts_to_duration(-3, Rational::new(1, 25)), Some(Duration::ZERO));
        assert_eq!(pts_to_duration(10, Rational::new(1, 0)), None);
    }
}
