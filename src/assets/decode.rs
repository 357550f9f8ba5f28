use std::path::Path;

use anyhow::Context;

use crate::{
    foundation::error::{AnimError, AnimResult},
    frame::Frame,
};

/// Decode an in-memory image into a display-domain RGB frame.
///
/// Grayscale, alpha and 16-bit inputs are flattened to 8-bit RGB; alpha is dropped.
pub fn decode_image(bytes: &[u8]) -> AnimResult<Frame> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| AnimError::decode(format!("decode image from memory: {e}")))?;
    let rgb = dyn_img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(AnimError::empty_input("decoded image has no pixels"));
    }
    Ok(Frame::Display(rgb))
}

/// Load the still source image from disk.
#[tracing::instrument]
pub fn load_source_image(path: &Path) -> AnimResult<Frame> {
    if !path.is_file() {
        return Err(AnimError::not_found(path));
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("read source image '{}'", path.display()))?;
    let frame = decode_image(&bytes).map_err(|e| match e {
        AnimError::Decode(msg) => AnimError::decode(format!("'{}': {msg}", path.display())),
        other => other,
    })?;
    tracing::debug!(width = frame.width(), height = frame.height(), "source image loaded");
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_rgba_png_drops_alpha() {
        let src = image::RgbaImage::from_raw(1, 1, vec![100u8, 50u8, 200u8, 128u8]).unwrap();
        let frame = decode_image(&encode_png(image::DynamicImage::ImageRgba8(src))).unwrap();
        assert_eq!(frame.dimensions(), (1, 1));
        assert_eq!(frame.as_display().unwrap().as_raw(), &vec![100, 50, 200]);
    }

    #[test]
    fn decode_gray_png_expands_to_rgb() {
        let src = image::GrayImage::from_raw(2, 1, vec![7u8, 9u8]).unwrap();
        let frame = decode_image(&encode_png(image::DynamicImage::ImageLuma8(src))).unwrap();
        assert_eq!(frame.as_display().unwrap().as_raw(), &vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(AnimError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_source_image(Path::new("does/not/exist.jpg")).unwrap_err();
        assert!(matches!(err, AnimError::NotFound(_)));
    }
}
