use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg;
use image::RgbImage;
use tracing::{debug, warn};

use crate::capture::VideoSource;
use crate::error::RemixError;

pub const JPEG_QUALITY: u8 = 95;
pub const JPEG_MIME: &str = "image/jpeg";

/// One still taken from the source video, JPEG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl SampledFrame {
    pub fn encode(index: u64, still: &RgbImage) -> Result<Self, RemixError> {
        let mut bytes = Vec::new();
        let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        encoder
            .encode(
                still,
                still.width(),
                still.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|error| RemixError::decode(index, error))?;

        Ok(Self {
            index,
            width: still.width(),
            height: still.height(),
            bytes,
        })
    }

    pub fn mime(&self) -> &'static str {
        JPEG_MIME
    }

    pub fn base64(&self) -> String {
        BASE64_STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), self.base64())
    }
}

/// Distance between sampled frame indices. Never zero, so short videos are
/// sampled one frame at a time.
pub fn stride(total_frames: u64, target_count: usize) -> u64 {
    (total_frames / target_count.max(1) as u64).max(1)
}

/// Pick up to `target_count` frames evenly spaced from the start of `source`.
///
/// The source is consumed and released before returning. Frames that fail
/// to decode are skipped; if none survive the whole call fails.
pub fn sample<S: VideoSource>(
    mut source: S,
    target_count: usize,
) -> Result<Vec<SampledFrame>, RemixError> {
    if target_count == 0 {
        return Err(RemixError::InvalidFrameCount);
    }

    let total_frames = source.frame_count();
    if total_frames == 0 {
        return Err(RemixError::Source("video reports zero frames".to_owned()));
    }

    let stride = stride(total_frames, target_count);
    debug!(total_frames, target_count, stride, "sampling frames");

    let mut frames = Vec::with_capacity(target_count.min(total_frames as usize));
    let mut index = 0;
    while index < total_frames && frames.len() < target_count {
        match source
            .frame(index)
            .and_then(|still| SampledFrame::encode(index, &still))
        {
            Ok(frame) => frames.push(frame),
            Err(error) => warn!(index, %error, "skipping frame"),
        }
        index += stride;
    }

    if frames.is_empty() {
        return Err(RemixError::Source("no usable frames".to_owned()));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Synthetic {
        frames: u64,
        broken: Vec<u64>,
    }

    impl Synthetic {
        fn new(frames: u64) -> Self {
            Self {
                frames,
                broken: Vec::new(),
            }
        }
    }

    impl VideoSource for Synthetic {
        fn frame_count(&self) -> u64 {
            self.frames
        }

        fn frame(&mut self, index: u64) -> Result<RgbImage, RemixError> {
            assert!(index < self.frames, "read past end: {index}");
            if self.broken.contains(&index) {
                return Err(RemixError::decode(index, "corrupt packet"));
            }
            let shade = (index % 256) as u8;
            Ok(RgbImage::from_pixel(36, 64, image::Rgb([shade, 0, 255 - shade])))
        }
    }

    fn indices(frames: &[SampledFrame]) -> Vec<u64> {
        frames.iter().map(|frame| frame.index).collect()
    }

    #[test]
    fn long_video_is_sampled_at_even_stride() {
        let frames = sample(Synthetic::new(150), 5).unwrap();
        assert_eq!(indices(&frames), vec![0, 30, 60, 90, 120]);
    }

    #[test]
    fn short_video_yields_every_frame() {
        let frames = sample(Synthetic::new(3), 5).unwrap();
        assert_eq!(indices(&frames), vec![0, 1, 2]);
    }

    #[test]
    fn stride_is_clamped_to_one() {
        assert_eq!(stride(3, 5), 1);
        assert_eq!(stride(0, 5), 1);
        assert_eq!(stride(150, 5), 30);
        assert_eq!(stride(152, 5), 30);
    }

    #[test]
    fn output_length_and_order_hold_across_sizes() {
        for total in 1..=40u64 {
            for target in 1..=8usize {
                let frames = sample(Synthetic::new(total), target).unwrap();
                let got = indices(&frames);
                assert_eq!(got.len() as u64, total.min(target as u64), "{total}/{target}");
                assert!(got.windows(2).all(|pair| pair[0] < pair[1]), "{got:?}");
            }
        }
    }

    #[test]
    fn zero_frame_video_is_a_source_error() {
        let error = sample(Synthetic::new(0), 5).unwrap_err();
        assert!(matches!(error, RemixError::Source(_)), "{error}");
    }

    #[test]
    fn zero_target_is_rejected() {
        let error = sample(Synthetic::new(10), 0).unwrap_err();
        assert!(matches!(error, RemixError::InvalidFrameCount));
    }

    #[test]
    fn broken_frame_is_skipped() {
        let source = Synthetic {
            frames: 150,
            broken: vec![60],
        };
        let frames = sample(source, 5).unwrap();
        assert_eq!(indices(&frames), vec![0, 30, 90, 120]);
    }

    #[test]
    fn all_frames_broken_is_a_source_error() {
        let source = Synthetic {
            frames: 2,
            broken: vec![0, 1],
        };
        let error = sample(source, 5).unwrap_err();
        assert!(error.to_string().contains("no usable frames"), "{error}");
    }

    #[test]
    fn encoded_frame_keeps_dimensions() {
        let frames = sample(Synthetic::new(10), 2).unwrap();
        for frame in frames {
            let decoded =
                image::load_from_memory_with_format(&frame.bytes, image::ImageFormat::Jpeg).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (36, 64));
            assert_eq!((frame.width, frame.height), (36, 64));
        }
    }

    #[test]
    fn data_url_is_inline_jpeg() {
        let frame = SampledFrame::encode(0, &RgbImage::new(4, 4)).unwrap();
        let url = frame.data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let payload = url.trim_start_matches("data:image/jpeg;base64,");
        assert_eq!(BASE64_STANDARD.decode(payload).unwrap(), frame.bytes);
    }
}
