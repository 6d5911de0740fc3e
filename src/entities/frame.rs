//! Decoded animation frames and immutable frame sets
//!
//! **Why**: A multi-frame image is decoded once and then shared by every
//! selector showing it. Frames and sets are therefore cheap handles over
//! shared pixel buffers, never copied after decode.
//!
//! **Used by**: Codec (produces), FrameCache (stores), FrameSelector (reads)
//!
//! # Native timing
//!
//! Each frame keeps the delay embedded in the source image. Selection never
//! looks at it: the displayed frame is chosen from external progress only.

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::errors::DecodeError;

/// Single decoded RGBA8 frame
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
    delay: Duration,
}

impl Frame {
    pub fn new(image: RgbaImage, delay: Duration) -> Self {
        Self {
            image: Arc::new(image),
            delay,
        }
    }

    /// Frame with no native delay (still images)
    pub fn still(image: RgbaImage) -> Self {
        Self::new(image, Duration::ZERO)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Delay the source image assigns to this frame
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Raw RGBA8 pixels, row-major
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Size of the pixel buffer in bytes
    pub fn mem(&self) -> usize {
        self.image.as_raw().len()
    }

    /// True if both handles share one pixel buffer
    pub fn ptr_eq(a: &Frame, b: &Frame) -> bool {
        Arc::ptr_eq(&a.image, &b.image)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Ordered, immutable sequence of 1..N frames
///
/// Cloning shares the underlying frames.
#[derive(Clone)]
pub struct FrameSet {
    frames: Arc<[Frame]>,
}

impl FrameSet {
    /// Build a set from decoded frames
    ///
    /// # Errors
    ///
    /// `DecodeError::NoFrames` if `frames` is empty.
    pub fn new(frames: Vec<Frame>) -> Result<Self, DecodeError> {
        if frames.is_empty() {
            return Err(DecodeError::NoFrames);
        }
        Ok(Self {
            frames: frames.into(),
        })
    }

    /// Number of frames, always >= 1
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Frame> {
        self.frames.get(idx)
    }

    pub fn first(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Sum of the native delays
    pub fn total_delay(&self) -> Duration {
        self.frames.iter().map(Frame::delay).sum()
    }

    /// Total pixel memory of all frames in bytes
    pub fn mem(&self) -> usize {
        self.frames.iter().map(Frame::mem).sum()
    }

    /// True if both handles share one frame list
    pub fn ptr_eq(a: &FrameSet, b: &FrameSet) -> bool {
        Arc::ptr_eq(&a.frames, &b.frames)
    }
}

impl fmt::Debug for FrameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSet")
            .field("len", &self.len())
            .field("mem", &self.mem())
            .finish()
    }
}
