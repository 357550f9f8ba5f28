//! Aspect-preserving fit of a frame into the fixed model resolution.
//!
//! The frame is scaled uniformly so it fits inside the target, then centered on a black canvas.
//! Only geometry changes: resampling keeps the frame's domain and value range.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb32FImage};

use crate::foundation::core::TargetShape;
use crate::foundation::error::{AnimError, AnimResult};
use crate::frame::Frame;

/// Triangle is anti-aliased on downscale (the kernel widens with the scale factor).
const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Where a scaled frame lands on the target canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Uniform scale factor that fits `width x height` inside `shape`.
pub fn fit_scale(width: u32, height: u32, shape: TargetShape) -> f64 {
    let sx = f64::from(shape.width) / f64::from(width);
    let sy = f64::from(shape.height) / f64::from(height);
    sx.min(sy)
}

/// Scaled size and centered offset of a `width x height` frame inside `shape`.
///
/// Scaled dimensions are clamped to `1..=target` so rounding can never overflow the canvas.
pub fn letterbox(width: u32, height: u32, shape: TargetShape) -> AnimResult<Placement> {
    if width == 0 || height == 0 {
        return Err(AnimError::validation(format!(
            "cannot fit an empty {width}x{height} frame"
        )));
    }
    shape.validate()?;

    let scale = fit_scale(width, height, shape);
    let scaled = |dim: u32, max: u32| -> u32 {
        let v = (f64::from(dim) * scale).round();
        (v as u32).clamp(1, max)
    };
    let w = scaled(width, shape.width);
    let h = scaled(height, shape.height);

    Ok(Placement {
        width: w,
        height: h,
        x: (shape.width - w) / 2,
        y: (shape.height - h) / 2,
    })
}

/// Resize `frame` into exactly `shape`, preserving aspect ratio with symmetric black padding.
pub fn normalize_geometry(frame: &Frame, shape: TargetShape) -> AnimResult<Frame> {
    let (w, h) = frame.dimensions();
    let placement = letterbox(w, h, shape)?;

    Ok(match frame {
        Frame::Display(img) => Frame::Display(fit_onto_canvas(img, placement, shape)),
        Frame::Model(img) => Frame::Model(fit_float_onto_canvas(img, placement, shape)),
    })
}

/// `imageops::resize` clamps float output to `[0, 1]`, so a frame with a larger peak is scaled
/// down to unit range for the resample and back up afterwards.
fn fit_float_onto_canvas(
    img: &Rgb32FImage,
    placement: Placement,
    shape: TargetShape,
) -> Rgb32FImage {
    let peak = img
        .as_raw()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    if peak <= 1.0 {
        return fit_onto_canvas(img, placement, shape);
    }

    let mut unit = img.clone();
    unit.iter_mut().for_each(|v| *v /= peak);
    let mut out = fit_onto_canvas(&unit, placement, shape);
    out.iter_mut().for_each(|v| *v *= peak);
    out
}

fn fit_onto_canvas<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    placement: Placement,
    shape: TargetShape,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let mut canvas = ImageBuffer::<P, Vec<P::Subpixel>>::new(shape.width, shape.height);
    if img.dimensions() == (placement.width, placement.height) {
        imageops::replace(&mut canvas, img, i64::from(placement.x), i64::from(placement.y));
    } else {
        let resized = imageops::resize(img, placement.width, placement.height, RESAMPLE_FILTER);
        imageops::replace(
            &mut canvas,
            &resized,
            i64::from(placement.x),
            i64::from(placement.y),
        );
    }
    canvas
}
