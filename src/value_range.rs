use image::{Rgb32FImage, RgbImage};

use crate::frame::{Frame, FrameSequence};

const DISPLAY_MAX: f32 = 255.0;

/// Convert to the model domain (`f32`, `0.0..=1.0`).
///
/// Display frames are always divided by 255. A float frame is divided only when it holds a
/// value above 1.0, so an already normalized frame is returned untouched and repeated calls
/// never double-scale.
pub fn to_model_domain(frame: Frame) -> Frame {
    match frame {
        Frame::Display(img) => {
            let (w, h) = img.dimensions();
            let data = img
                .into_raw()
                .into_iter()
                .map(|v| f32::from(v) / DISPLAY_MAX)
                .collect();
            Frame::Model(model_buffer(w, h, data))
        }
        Frame::Model(img) if img.as_raw().iter().any(|&v| v > 1.0) => {
            let (w, h) = img.dimensions();
            let data = img.into_raw().into_iter().map(|v| v / DISPLAY_MAX).collect();
            Frame::Model(model_buffer(w, h, data))
        }
        model @ Frame::Model(_) => model,
    }
}

/// Convert to the display domain: clip to `[0, 1]`, scale, round, saturate to `u8`.
pub fn to_display_domain(frame: Frame) -> Frame {
    match frame {
        display @ Frame::Display(_) => display,
        Frame::Model(img) => {
            let (w, h) = img.dimensions();
            let data = img.as_raw().iter().map(|&v| unit_to_u8(v)).collect();
            Frame::Display(display_buffer(w, h, data))
        }
    }
}

pub fn to_model_sequence(seq: FrameSequence) -> FrameSequence {
    seq.into_iter().map(to_model_domain).collect()
}

pub fn to_display_sequence(seq: FrameSequence) -> FrameSequence {
    seq.into_iter().map(to_display_domain).collect()
}

fn unit_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    // `as` saturates, the clamp keeps the rounding symmetric at both ends.
    (v.clamp(0.0, 1.0) * DISPLAY_MAX).round() as u8
}

// Dimensions come from an existing buffer of the same length, so reconstruction cannot fail.
fn model_buffer(w: u32, h: u32, data: Vec<f32>) -> Rgb32FImage {
    Rgb32FImage::from_vec(w, h, data).unwrap_or_else(|| Rgb32FImage::new(w, h))
}

fn display_buffer(w: u32, h: u32, data: Vec<u8>) -> RgbImage {
    RgbImage::from_vec(w, h, data).unwrap_or_else(|| RgbImage::new(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Domain;

    fn all_levels_frame() -> Frame {
        let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2]).collect();
        Frame::from_rgb8(16, 16, data).unwrap()
    }

    #[test]
    fn display_frame_scales_into_unit_range() {
        let out = to_model_domain(all_levels_frame());
        assert_eq!(out.domain(), Domain::Model);
        let img = out.as_model().unwrap();
        assert!(img.as_raw().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((out.max_sample() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn round_trip_reproduces_every_level() {
        let src = all_levels_frame();
        let back = to_display_domain(to_model_domain(src.clone()));
        let (a, b) = (src.as_display().unwrap(), back.as_display().unwrap());
        for (x, y) in a.as_raw().iter().zip(b.as_raw()) {
            assert!(x.abs_diff(*y) <= 1);
        }
    }

    #[test]
    fn already_normalized_frame_is_unchanged() {
        let f = Frame::from_rgb_f32(1, 2, vec![0.0, 0.5, 1.0, 0.25, 0.75, 0.1]).unwrap();
        assert_eq!(to_model_domain(f.clone()), f);
        assert_eq!(to_model_domain(to_model_domain(f.clone())), f);
    }

    #[test]
    fn float_frame_in_display_range_is_scaled() {
        let f = Frame::from_rgb_f32(1, 1, vec![255.0, 127.5, 0.0]).unwrap();
        let out = to_model_domain(f);
        let px = out.as_model().unwrap().get_pixel(0, 0).0;
        assert!((px[0] - 1.0).abs() < 1e-6);
        assert!((px[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn near_black_display_frames_survive_round_trip() {
        for data in [vec![0u8; 6], vec![1, 0, 0, 0, 1, 1], vec![1; 6]] {
            let src = Frame::from_rgb8(2, 1, data.clone()).unwrap();
            let model = to_model_domain(src);
            assert!(model.max_sample() <= 1.0 / 255.0 + 1e-6);
            let back = to_display_domain(model);
            assert_eq!(back.as_display().unwrap().as_raw(), &data);
        }
    }

    #[test]
    fn display_conversion_clips_and_saturates() {
        let f = Frame::from_rgb_f32(2, 1, vec![-0.3, 1.7, 0.5, f32::NAN, 0.999, 0.001]).unwrap();
        let out = to_display_domain(f);
        assert_eq!(out.as_display().unwrap().as_raw(), &vec![0, 255, 128, 0, 255, 0]);
    }
}
