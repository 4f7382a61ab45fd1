use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, ArrayView3};
use tracing::debug;

/// A caller-owned RGB pixel buffer with shape (height, width, 3).
pub type Frame = Array3<u8>;

/// Reads an image file into a (height, width, 3) frame.
///
/// The decode must yield 3-channel RGB. Grayscale and RGBA sources are
/// rejected rather than converted, so the caller knows exactly what the
/// detector will see.
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded =
        image::load_from_memory(&bytes).with_context(|| format!("decoding {}", path.display()))?;

    let img = match decoded {
        DynamicImage::ImageRgb8(img) => img,
        other => bail!(
            "{} decoded as {:?}, expected 3-channel RGB",
            path.display(),
            other.color()
        ),
    };

    let (width, height) = img.dimensions();
    debug!("loaded {} as {width}x{height} frame", path.display());

    Array3::from_shape_vec((height as usize, width as usize, 3), img.into_raw())
        .with_context(|| format!("reshaping {} into a {height}x{width}x3 frame", path.display()))
}

/// Fits the frame to the target dimensions, preserving aspect ratio by
/// scaling and center-cropping the overflow. The caller's buffer is
/// replaced in place; afterwards its shape is exactly
/// (new_height, new_width, 3).
pub fn resize_frame(frame: &mut Frame, new_width: u32, new_height: u32) -> Result<()> {
    let img = frame_to_image(frame)?;
    let fitted = DynamicImage::ImageRgb8(img)
        .resize_to_fill(new_width, new_height, FilterType::Lanczos3)
        .into_rgb8();

    *frame = Array3::from_shape_vec(
        (new_height as usize, new_width as usize, 3),
        fitted.into_raw(),
    )
    .with_context(|| format!("reshaping resized frame to {new_height}x{new_width}x3"))?;

    Ok(())
}

/// Converts a frame into an owned image for the drawing routines.
pub(crate) fn frame_to_image(frame: &Frame) -> Result<RgbImage> {
    let (height, width, channels) = frame.dim();
    if channels != 3 {
        bail!("frame has {channels} channels, expected 3 (RGB)");
    }

    let pixels = frame.iter().copied().collect();
    RgbImage::from_raw(width as u32, height as u32, pixels)
        .with_context(|| format!("framing {height}x{width}x{channels} buffer as an RGB image"))
}

/// Copies drawn pixels back into the caller's frame. Dimensions must match
/// the frame exactly.
pub(crate) fn copy_into_frame(frame: &mut Frame, img: &RgbImage) -> Result<()> {
    let (height, width, _) = frame.dim();
    if (img.width() as usize, img.height() as usize) != (width, height) {
        bail!(
            "image is {}x{}, frame is {width}x{height}",
            img.width(),
            img.height()
        );
    }

    let drawn = ArrayView3::from_shape((height, width, 3), img.as_raw())
        .context("viewing drawn image as a frame")?;
    frame.assign(&drawn);
    Ok(())
}
