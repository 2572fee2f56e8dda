use std::path::Path;
use std::sync::OnceLock;

use ffmpeg::util::frame::video::Video;
use ffmpeg_next::{
    self as ffmpeg, codec, decoder, format, media, rescale, software, Rational, Rescale,
};
use image::RgbImage;
use tracing::debug;

use crate::error::RemixError;

/// A seekable sequence of decoded frames with a known length.
pub trait VideoSource {
    fn frame_count(&self) -> u64;

    /// Decode the frame at `index`. Failures are reported as
    /// [`RemixError::Decode`] and only affect that index.
    fn frame(&mut self, index: u64) -> Result<RgbImage, RemixError>;
}

static INIT: OnceLock<Result<(), ffmpeg::Error>> = OnceLock::new();

pub fn init() -> Result<(), RemixError> {
    INIT.get_or_init(|| {
        let result = ffmpeg::init();
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        result
    })
    .clone()
    .map_err(|error| RemixError::Source(format!("FFmpeg initialisation failed: {error}")))
}

/// A video file opened through FFmpeg. The demuxer, decoder and scaler are
/// released when the value is dropped.
pub struct FfmpegVideo {
    input: format::context::Input,
    decoder: decoder::Video,
    scaler: software::scaling::context::Context,
    stream_index: usize,
    timeline: Timeline,
    frame_count: u64,
}

/// Maps decoded timestamps back to frame indices.
#[derive(Debug, Clone, Copy)]
struct Timeline {
    time_base: Rational,
    start_time: i64,
    frames_per_second: f64,
}

impl Timeline {
    /// Frame index implied by a decoded frame's timestamp, counted from the
    /// stream start. Frames without a timestamp count as the stream start.
    fn index_of(&self, frame: &Video) -> u64 {
        let pts = frame
            .timestamp()
            .or(frame.pts())
            .map_or(0, |pts| (pts - self.start_time).max(0));
        (pts as f64 * f64::from(self.time_base) * self.frames_per_second).round() as u64
    }

    /// Seek target for `index` in `AV_TIME_BASE` units, offset by the
    /// stream start so it agrees with [`Timeline::index_of`].
    fn seek_position(&self, index: u64) -> i64 {
        let micros = (index as f64 * 1_000_000.0 / self.frames_per_second) as i64;
        micros.rescale((1, 1_000_000), rescale::TIME_BASE)
            + self.start_time.rescale(self.time_base, rescale::TIME_BASE)
    }
}

impl FfmpegVideo {
    pub fn open(path: &Path) -> Result<Self, RemixError> {
        init()?;

        let input = format::input(&path).map_err(|error| source_error(path, error))?;

        let (stream_index, time_base, start_time, frames_per_second, frame_count, decoder) = {
            let stream = input
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| source_error(path, ffmpeg::Error::StreamNotFound))?;

            let frames_per_second = rational_to_f64(stream.avg_frame_rate())
                .or_else(|| rational_to_f64(stream.rate()))
                .ok_or_else(|| source_error(path, "unknown frame rate"))?;

            let frame_count = if stream.frames() > 0 {
                stream.frames() as u64
            } else {
                let seconds = if stream.duration() > 0 {
                    stream.duration() as f64 * f64::from(stream.time_base())
                } else {
                    input.duration().max(0) as f64 * f64::from(rescale::TIME_BASE)
                };
                (seconds * frames_per_second) as u64
            };

            let decoder = codec::context::Context::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|error| source_error(path, error))?;

            // AV_NOPTS_VALUE when the container does not say.
            let start_time = match stream.start_time() {
                i64::MIN => 0,
                start => start,
            };

            (
                stream.index(),
                stream.time_base(),
                start_time,
                frames_per_second,
                frame_count,
                decoder,
            )
        };

        if frame_count == 0 {
            return Err(source_error(path, "video reports zero frames"));
        }

        let scaler = software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            software::scaling::Flags::BILINEAR,
        )
        .map_err(|error| source_error(path, error))?;

        debug!(
            path = %path.display(),
            frame_count,
            frames_per_second,
            width = decoder.width(),
            height = decoder.height(),
            "opened video"
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            timeline: Timeline {
                time_base,
                start_time,
                frames_per_second,
            },
            frame_count,
        })
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }
}

impl VideoSource for FfmpegVideo {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame(&mut self, index: u64) -> Result<RgbImage, RemixError> {
        if index >= self.frame_count {
            return Err(RemixError::decode(index, "beyond end of stream"));
        }

        // Land on the keyframe at or before the target, then decode forward.
        let position = self.timeline.seek_position(index);
        self.input
            .seek(position, ..position)
            .map_err(|error| RemixError::decode(index, error))?;
        self.decoder.flush();

        let mut decoded = Video::empty();
        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|error| RemixError::decode(index, error))?;
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if self.timeline.index_of(&decoded) >= index {
                    return to_image(&mut self.scaler, &decoded)
                        .map_err(|reason| RemixError::decode(index, reason));
                }
            }
        }

        self.decoder
            .send_eof()
            .map_err(|error| RemixError::decode(index, error))?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            if self.timeline.index_of(&decoded) >= index {
                return to_image(&mut self.scaler, &decoded)
                    .map_err(|reason| RemixError::decode(index, reason));
            }
        }

        Err(RemixError::decode(index, "frame not found in stream"))
    }
}

fn source_error(path: &Path, reason: impl std::fmt::Display) -> RemixError {
    RemixError::Source(format!("{}: {reason}", path.display()))
}

fn rational_to_f64(rational: Rational) -> Option<f64> {
    if rational.numerator() > 0 && rational.denominator() > 0 {
        Some(f64::from(rational))
    } else {
        None
    }
}

fn to_image(
    scaler: &mut software::scaling::context::Context,
    decoded: &Video,
) -> Result<RgbImage, String> {
    let mut rgb_frame = Video::empty();
    scaler.run(decoded, &mut rgb_frame).map_err(|error| error.to_string())?;

    let (width, height) = (rgb_frame.width(), rgb_frame.height());
    RgbImage::from_raw(width, height, packed_rgb(&rgb_frame, width, height))
        .ok_or_else(|| "decoded frame does not fit an RGB image".to_owned())
}

/// Copy an RGB24 plane into a tightly packed buffer, dropping any per-row
/// padding FFmpeg added.
fn packed_rgb(frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);

    if stride == row_len {
        return data[..row_len * height as usize].to_vec();
    }
    let mut buffer = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        buffer.extend_from_slice(&data[start..start + row_len]);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(start_time: i64) -> Timeline {
        Timeline {
            time_base: Rational(1, 15360),
            start_time,
            frames_per_second: 30.0,
        }
    }

    fn frame_at(pts: Option<i64>) -> Video {
        let mut frame = Video::empty();
        frame.set_pts(pts);
        frame
    }

    #[test]
    fn timestamps_map_to_frame_indices() {
        let timeline = timeline(0);
        assert_eq!(timeline.index_of(&frame_at(Some(0))), 0);
        assert_eq!(timeline.index_of(&frame_at(Some(512))), 1);
        assert_eq!(timeline.index_of(&frame_at(Some(15360))), 30);
        assert_eq!(timeline.index_of(&frame_at(None)), 0);
    }

    #[test]
    fn start_offset_is_removed() {
        let timeline = timeline(1024);
        assert_eq!(timeline.index_of(&frame_at(Some(1024))), 0);
        assert_eq!(timeline.index_of(&frame_at(Some(1024 + 512 * 60))), 60);
        assert_eq!(timeline.index_of(&frame_at(Some(0))), 0);
    }

    #[test]
    fn seek_position_is_in_microseconds() {
        let timeline = timeline(0);
        assert_eq!(timeline.seek_position(0), 0);
        assert_eq!(timeline.seek_position(30), 1_000_000);
        assert_eq!(timeline.seek_position(90), 3_000_000);
    }

    #[test]
    fn seek_position_follows_start_offset() {
        // 1024 / 15360 s and -512 / 15360 s, rounded to the nearest microsecond.
        assert_eq!(timeline(1024).seek_position(0), 66_667);
        assert_eq!(timeline(1024).seek_position(30), 1_066_667);
        assert_eq!(timeline(-512).seek_position(30), 966_667);
    }
}
