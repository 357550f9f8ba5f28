use image::{Rgb32FImage, RgbImage};

use crate::foundation::core::TargetShape;
use crate::foundation::error::{AnimError, AnimResult};

/// Pixel value domain of a [`Frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// 8-bit samples in `0..=255`.
    Display,
    /// `f32` samples, nominally in `0.0..=1.0`.
    Model,
}

/// A three-channel frame tagged with its value domain.
///
/// The domain lives in the variant, so a stage that expects model-domain input cannot be handed
/// display-domain pixels without an explicit conversion through [`crate::value_range`].
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Display(RgbImage),
    Model(Rgb32FImage),
}

impl Frame {
    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> AnimResult<Self> {
        check_len(width, height, data.len())?;
        RgbImage::from_raw(width, height, data)
            .map(Self::Display)
            .ok_or_else(|| AnimError::validation("rgb8 buffer does not match frame dimensions"))
    }

    pub fn from_rgb_f32(width: u32, height: u32, data: Vec<f32>) -> AnimResult<Self> {
        check_len(width, height, data.len())?;
        Rgb32FImage::from_raw(width, height, data)
            .map(Self::Model)
            .ok_or_else(|| AnimError::validation("f32 buffer does not match frame dimensions"))
    }

    /// Solid display-domain frame; handy for fixtures and padding tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::Display(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Display(img) => img.dimensions(),
            Self::Model(img) => img.dimensions(),
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::Display(_) => Domain::Display,
            Self::Model(_) => Domain::Model,
        }
    }

    pub fn matches_shape(&self, shape: TargetShape) -> bool {
        self.dimensions() == (shape.width, shape.height)
    }

    /// Largest sample value as `f32`; `0.0` for an empty frame. NaN samples are ignored.
    pub fn max_sample(&self) -> f32 {
        match self {
            Self::Display(img) => img.as_raw().iter().copied().max().map_or(0.0, f32::from),
            Self::Model(img) => img.as_raw().iter().copied().fold(0.0, f32::max),
        }
    }

    pub fn as_display(&self) -> Option<&RgbImage> {
        match self {
            Self::Display(img) => Some(img),
            Self::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&Rgb32FImage> {
        match self {
            Self::Model(img) => Some(img),
            Self::Display(_) => None,
        }
    }
}

fn check_len(width: u32, height: u32, len: usize) -> AnimResult<()> {
    let expected = width as usize * height as usize * 3;
    if expected == 0 {
        return Err(AnimError::validation(format!(
            "frame dimensions must be non-zero, got {width}x{height}"
        )));
    }
    if len != expected {
        return Err(AnimError::validation(format!(
            "frame buffer has {len} samples, expected {expected} for {width}x{height}x3"
        )));
    }
    Ok(())
}

/// Temporally ordered frames. Index `i` is frame `i` of the clip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Frame> {
        self.frames.get(idx)
    }

    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Check that every frame has `shape` and `domain`.
    pub fn ensure_uniform(&self, shape: TargetShape, domain: Domain) -> AnimResult<()> {
        for (idx, frame) in self.frames.iter().enumerate() {
            if frame.domain() != domain {
                return Err(AnimError::validation(format!(
                    "frame {idx} is in {:?} domain, expected {domain:?}",
                    frame.domain()
                )));
            }
            if !frame.matches_shape(shape) {
                let (w, h) = frame.dimensions();
                return Err(AnimError::validation(format!(
                    "frame {idx} is {w}x{h}, expected {}x{}",
                    shape.width, shape.height
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Frame>> for FrameSequence {
    fn from(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

impl FromIterator<Frame> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FrameSequence {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
