//! Raw and calibrated sensor frames.

use anyhow::Result;
use ndarray::Array2;
use serde_derive::*;

/// One raw sensor frame: a `height x width` grid of 16-bit
/// intensities as read from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pixels: Array2<u16>,
}

impl RawFrame {
    pub fn new(pixels: Array2<u16>) -> Self {
        RawFrame { pixels }
    }

    /// Build a frame from row-major pixel values.
    pub fn from_shape_vec(height: usize, width: usize, values: Vec<u16>) -> Result<Self> {
        Ok(RawFrame {
            pixels: Array2::from_shape_vec((height, width), values)?,
        })
    }

    /// A frame with every pixel set to `value`.
    pub fn filled(height: usize, width: usize, value: u16) -> Self {
        RawFrame {
            pixels: Array2::from_elem((height, width), value),
        }
    }

    pub fn pixels(&self) -> &Array2<u16> {
        &self.pixels
    }

    /// `(height, width)`, matching the ndarray convention.
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn to_float(&self) -> Array2<f32> {
        self.pixels.mapv(f32::from)
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats::of(self.pixels.iter().map(|&v| f32::from(v)))
    }
}

/// A frame after baseline subtraction. Values may be negative;
/// nothing is clamped at this stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedFrame {
    values: Array2<f32>,
}

impl CalibratedFrame {
    pub fn new(values: Array2<f32>) -> Self {
        CalibratedFrame { values }
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f32> {
        self.values
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats::of(self.values.iter().copied())
    }
}

impl From<&RawFrame> for CalibratedFrame {
    fn from(frame: &RawFrame) -> Self {
        CalibratedFrame::new(frame.to_float())
    }
}

/// Minimum and maximum of a frame. An empty frame reports
/// zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameStats {
    pub min: f32,
    pub max: f32,
}

impl FrameStats {
    fn of<I: Iterator<Item = f32>>(values: I) -> Self {
        let (min, max) = values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min > max {
            FrameStats::default()
        } else {
            FrameStats { min, max }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_extremes() -> Result<()> {
        let frame = RawFrame::from_shape_vec(2, 3, vec![5, 1, 9, 3, 3, 7])?;
        assert_eq!(frame.dim(), (2, 3));
        assert_eq!(frame.stats(), FrameStats { min: 1., max: 9. });

        let calibrated = CalibratedFrame::from(&frame);
        assert_eq!(calibrated.values()[(1, 2)], 7.);
        assert_eq!(calibrated.stats(), frame.stats());
        Ok(())
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(RawFrame::from_shape_vec(2, 2, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn empty_frame_has_zero_stats() -> Result<()> {
        let frame = RawFrame::from_shape_vec(0, 0, vec![])?;
        assert_eq!(frame.stats(), FrameStats::default());
        Ok(())
    }
}
