//! Image codec backed by the `image` crate
//!
//! Unified interface for turning encoded bytes into a [`FrameSet`]:
//! - GIF: every animation frame, iterating the decoder until exhausted
//! - WebP: every animation frame when animated, otherwise a single still
//! - Anything else `image` can read: a single-frame set
//!
//! Frames come out composited and RGBA8, ready to paint.

use image::{AnimationDecoder, ImageFormat};
use log::debug;
use std::io::Cursor;
use std::time::Duration;

use super::errors::DecodeError;
use super::frame::{Frame, FrameSet};
use super::traits::Codec;

/// Default codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_animation<'a>(decoder: impl AnimationDecoder<'a>) -> Result<Vec<Frame>, DecodeError> {
        let mut frames = Vec::new();
        for frame in decoder.into_frames() {
            let frame = frame?;
            let delay = delay_to_duration(frame.delay());
            frames.push(Frame::new(frame.into_buffer(), delay));
        }
        Ok(frames)
    }

    fn decode_gif(bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
        let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))?;
        Self::decode_animation(decoder)
    }

    fn decode_webp(bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
        let decoder = image::codecs::webp::WebPDecoder::new(Cursor::new(bytes))?;
        if decoder.has_animation() {
            Self::decode_animation(decoder)
        } else {
            Self::decode_still(bytes)
        }
    }

    fn decode_still(bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
        let img = image::load_from_memory(bytes)?;
        Ok(vec![Frame::still(img.to_rgba8())])
    }
}

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<FrameSet, DecodeError> {
        let format = image::guess_format(bytes)
            .map_err(|_| DecodeError::UnsupportedFormat("unrecognized image signature".to_string()))?;

        let frames = match format {
            ImageFormat::Gif => Self::decode_gif(bytes)?,
            ImageFormat::WebP => Self::decode_webp(bytes)?,
            _ => Self::decode_still(bytes)?,
        };

        debug!("Decoded {:?}: {} frames ({} bytes in)", format, frames.len(), bytes.len());
        FrameSet::new(frames)
    }
}

/// Convert an image delay (a ms fraction) to a Duration
fn delay_to_duration(delay: image::Delay) -> Duration {
    let (numer, denom) = delay.numer_denom_ms();
    if denom == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(u64::from(numer) * 1000 / u64::from(denom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba, RgbaImage};

    fn gif_bytes(count: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frames = (0..count).map(|i| {
                image::Frame::from_parts(
                    RgbaImage::from_pixel(8, 8, Rgba([i * 50, 0, 0, 255])),
                    0,
                    0,
                    Delay::from_numer_denom_ms(100, 1),
                )
            });
            encoder.encode_frames(frames).unwrap();
        }
        bytes
    }

    #[test]
    fn test_decode_gif_frames() {
        let set = ImageCodec::new().decode(&gif_bytes(4)).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.first().width(), 8);
        assert_eq!(set.first().delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_decode_still_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();

        let set = ImageCodec::new().decode(&bytes).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.first().pixels()[..4], [1, 2, 3, 255]);
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let err = ImageCodec::new().decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_gif_fails() {
        let bytes = gif_bytes(2);
        let err = ImageCodec::new().decode(&bytes[..20]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Image(_) | DecodeError::UnsupportedFormat(_) | DecodeError::NoFrames
        ));
    }
}
