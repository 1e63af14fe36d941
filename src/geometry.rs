//! Exact rotations and integer upscaling of rendered images.

use std::convert::TryFrom;

use image::{imageops, ImageBuffer, Pixel};
use serde_derive::*;

/// Display orientation, in counter-clockwise quarter turns.
/// (De)serialises as degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Orientation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Orientation after adding `other` on top of this one.
    pub fn compose(self, other: Orientation) -> Orientation {
        Orientation::from_degrees((self.degrees() + other.degrees()) % 360)
    }

    /// The rotation that brings this one back to `Deg0`.
    pub fn inverse(self) -> Orientation {
        Orientation::from_degrees((360 - self.degrees()) % 360)
    }

    fn from_degrees(degrees: u32) -> Orientation {
        match degrees {
            90 => Orientation::Deg90,
            180 => Orientation::Deg180,
            270 => Orientation::Deg270,
            _ => Orientation::Deg0,
        }
    }

    /// Map a pixel position of a `width x height` image to its
    /// position after rotation.
    pub fn map_point(self, (x, y): (u32, u32), (width, height): (u32, u32)) -> (u32, u32) {
        match self {
            Orientation::Deg0 => (x, y),
            Orientation::Deg90 => (y, width - 1 - x),
            Orientation::Deg180 => (width - 1 - x, height - 1 - y),
            Orientation::Deg270 => (height - 1 - y, x),
        }
    }

    /// `(width, height)` after rotation.
    pub fn rotated_dims(self, (width, height): (u32, u32)) -> (u32, u32) {
        match self {
            Orientation::Deg0 | Orientation::Deg180 => (width, height),
            Orientation::Deg90 | Orientation::Deg270 => (height, width),
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Deg0
    }
}

impl TryFrom<u32> for Orientation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 | 90 | 180 | 270 => Ok(Orientation::from_degrees(degrees)),
            _ => Err(format!("orientation must be 0, 90, 180 or 270, got {}", degrees)),
        }
    }
}

impl From<Orientation> for u32 {
    fn from(o: Orientation) -> u32 {
        o.degrees()
    }
}

/// Largest accepted upscale factor.
pub const MAX_UPSCALE_FACTOR: u32 = 16;

type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Rotate counter-clockwise by `orientation`. Pixels are moved,
/// never resampled.
pub fn rotate<P>(image: &Image<P>, orientation: Orientation) -> Image<P>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    match orientation {
        Orientation::Deg0 => image.clone(),
        // imageops rotates clockwise
        Orientation::Deg90 => imageops::rotate270(image),
        Orientation::Deg180 => imageops::rotate180(image),
        Orientation::Deg270 => imageops::rotate90(image),
    }
}

/// Factor actually applied to a `width x height` image: at
/// least 1, at most [`MAX_UPSCALE_FACTOR`], and small enough
/// for the result to stay addressable.
pub fn effective_factor(factor: u32, (width, height): (u32, u32)) -> u32 {
    let fits = u32::MAX / width.max(height).max(1);
    factor.min(MAX_UPSCALE_FACTOR).min(fits).max(1)
}

/// Replicate every pixel into a `factor x factor` block. The
/// factor is limited by [`effective_factor`].
pub fn upscale<P>(image: &Image<P>, factor: u32) -> Image<P>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (width, height) = image.dimensions();
    let factor = effective_factor(factor, (width, height));
    match (width.checked_mul(factor), height.checked_mul(factor)) {
        (Some(w), Some(h)) if factor > 1 => {
            ImageBuffer::from_fn(w, h, |x, y| *image.get_pixel(x / factor, y / factor))
        }
        _ => image.clone(),
    }
}

/// Position of a source pixel in the rotated and upscaled
/// image: the centre of its replicated block.
pub fn project_point(
    point: (u32, u32),
    source_dims: (u32, u32),
    orientation: Orientation,
    factor: u32,
) -> (u32, u32) {
    let factor = factor.max(1);
    let (x, y) = orientation.map_point(point, source_dims);
    (x * factor + factor / 2, y * factor + factor / 2)
}
