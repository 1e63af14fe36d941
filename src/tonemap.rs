//! Turn calibrated float frames into coloured 8-bit images.
//!
//! Rendering runs in a fixed order:
//!
//! 1. normalise to 8-bit levels ([`ToneMapStrategy`])
//! 2. colour through the strategy's palette
//! 3. optional lightness contrast enhancement
//! 4. rotation by the display orientation
//! 5. nearest-neighbour upscaling
//! 6. optional temperature markers

use image::{Rgb, RgbImage};
use ndarray::Array2;
use serde_derive::*;

use crate::{
    contrast::{enhance_luminance_contrast, equalize_histogram, ClaheSettings},
    device::DeviceInfo,
    frame::CalibratedFrame,
    geometry::{effective_factor, rotate, upscale, Orientation},
    overlay::{draw_markers, markers_from_info},
    palette::Palette,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapStrategy {
    /// Shift to the frame minimum, divide by the (floored)
    /// maximum, colour with [`Palette::Jet`].
    MinMaxStretch,
    /// Histogram equalise, colour with [`Palette::Inferno`].
    HistogramEqualize,
}

impl ToneMapStrategy {
    pub fn palette(self) -> Palette {
        match self {
            ToneMapStrategy::MinMaxStretch => Palette::Jet,
            ToneMapStrategy::HistogramEqualize => Palette::Inferno,
        }
    }

    /// 8-bit intensity levels for a calibrated frame.
    pub fn levels(self, values: &Array2<f32>) -> Array2<u8> {
        match self {
            ToneMapStrategy::MinMaxStretch => stretch_levels(values),
            ToneMapStrategy::HistogramEqualize => equalize_histogram(values).mapv(unit_to_level),
        }
    }
}

/// Display settings, changed only through the pipeline's
/// setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub orientation: Orientation,
    pub upscale_factor: u32,
    pub tone_map: ToneMapStrategy,
    pub draw_temperature_overlay: bool,
    /// Replace the coloured image with its CLAHE enhanced
    /// version.
    pub luminance_contrast_enhance: bool,
    /// Show the full diagnostic status text.
    pub verbose: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            orientation: Orientation::Deg0,
            upscale_factor: 2,
            tone_map: ToneMapStrategy::HistogramEqualize,
            draw_temperature_overlay: false,
            luminance_contrast_enhance: false,
            verbose: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToneMapper {
    clahe: ClaheSettings,
}

impl ToneMapper {
    pub fn new(clahe: ClaheSettings) -> Self {
        ToneMapper { clahe }
    }

    /// Render `frame` to an image of `(height * k, width * k)`
    /// pixels (swapped for quarter turns), `k` being the
    /// upscale factor. `info` supplies the marker positions.
    pub fn render(
        &self,
        frame: &CalibratedFrame,
        config: &RenderConfig,
        info: &DeviceInfo,
    ) -> RgbImage {
        let levels = config.tone_map.levels(frame.values());
        let mut image = colorize(&levels, config.tone_map.palette());

        if config.luminance_contrast_enhance {
            image = enhance_luminance_contrast(&image, &self.clahe);
        }
        let source_dims = image.dimensions();
        let factor = effective_factor(config.upscale_factor, source_dims);
        let mut image = upscale(&rotate(&image, config.orientation), factor);

        if config.draw_temperature_overlay {
            let markers = markers_from_info(info);
            draw_markers(&mut image, &markers, source_dims, config.orientation, factor);
        }
        image
    }
}

/// `(v - min) / max(1, max(v - min))`, clipped to `[0, 1]` and
/// truncated to 8 bits.
fn stretch_levels(values: &Array2<f32>) -> Array2<u8> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted = values.mapv(|v| v - min);
    let max = shifted.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let divisor = max.max(1.);
    shifted.mapv(|v| unit_to_level(v / divisor))
}

fn unit_to_level(v: f32) -> u8 {
    (v.max(0.).min(1.) * 255.) as u8
}

pub fn colorize(levels: &Array2<u8>, palette: Palette) -> RgbImage {
    let (height, width) = levels.dim();
    let lut = palette.lut();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        lut[levels[(y as usize, x as usize)] as usize]
    })
}

/// Colour of every pixel, row-major. Handy for comparisons.
pub fn pixels_of(image: &RgbImage) -> Vec<Rgb<u8>> {
    image.pixels().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{device::InfoValue, frame::RawFrame, geometry::MAX_UPSCALE_FACTOR};
    use ndarray::arr2;

    fn plain(strategy: ToneMapStrategy) -> RenderConfig {
        RenderConfig {
            orientation: Orientation::Deg0,
            upscale_factor: 1,
            tone_map: strategy,
            draw_temperature_overlay: false,
            luminance_contrast_enhance: false,
            verbose: true,
        }
    }

    #[test]
    fn constant_frame_maps_to_level_zero() {
        let frame = CalibratedFrame::new(Array2::from_elem((3, 4), 100.));
        let config = plain(ToneMapStrategy::MinMaxStretch);
        let image = ToneMapper::default().render(&frame, &config, &DeviceInfo::default());
        assert_eq!(image.dimensions(), (4, 3));
        assert!(image.pixels().all(|p| *p == Palette::Jet.color(0)));
    }

    #[test]
    fn small_range_is_not_amplified() {
        // range below one stays below level 255
        let levels = stretch_levels(&arr2(&[[0., 0.5]]));
        assert_eq!(levels, arr2(&[[0u8, 127]]));
        let levels = stretch_levels(&arr2(&[[-10., 0.], [10., 30.]]));
        assert_eq!(levels, arr2(&[[0u8, 63], [127, 255]]));
    }

    #[test]
    fn two_by_two_raw_frame_end_to_end() -> anyhow::Result<()> {
        let raw = RawFrame::from_shape_vec(2, 2, vec![10; 4])?;
        let frame = CalibratedFrame::from(&raw);
        let config = plain(ToneMapStrategy::MinMaxStretch);
        let image = ToneMapper::default().render(&frame, &config, &DeviceInfo::default());
        assert_eq!(pixels_of(&image), vec![Palette::Jet.color(0); 4]);
        Ok(())
    }

    #[test]
    fn strategies_use_their_own_palettes() {
        let frame = CalibratedFrame::new(arr2(&[[0., 1000.]]));
        let mapper = ToneMapper::default();
        let info = DeviceInfo::default();
        let stretched = mapper.render(&frame, &plain(ToneMapStrategy::MinMaxStretch), &info);
        let equalized = mapper.render(&frame, &plain(ToneMapStrategy::HistogramEqualize), &info);
        assert_eq!(*stretched.get_pixel(1, 0), Palette::Jet.color(255));
        assert_eq!(*equalized.get_pixel(1, 0), Palette::Inferno.color(255));
        assert_ne!(pixels_of(&stretched), pixels_of(&equalized));
    }

    #[test]
    fn rotation_and_upscale_shape_the_output() {
        let frame = CalibratedFrame::new(Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32));
        let config = RenderConfig {
            orientation: Orientation::Deg90,
            upscale_factor: 3,
            ..plain(ToneMapStrategy::MinMaxStretch)
        };
        let image = ToneMapper::default().render(&frame, &config, &DeviceInfo::default());
        assert_eq!(image.dimensions(), (2 * 3, 3 * 3));
        // top-left block holds the old top-right pixel
        let expected = Palette::Jet.color(stretch_levels(frame.values())[(0, 2)]);
        for (x, y) in [(0, 0), (2, 2)].iter().copied() {
            assert_eq!(*image.get_pixel(x, y), expected);
        }
    }

    #[test]
    fn huge_upscale_factor_is_capped() {
        let frame = CalibratedFrame::new(Array2::zeros((2, 3)));
        let config = RenderConfig {
            upscale_factor: 20_000_000,
            ..plain(ToneMapStrategy::MinMaxStretch)
        };
        let image = ToneMapper::default().render(&frame, &config, &DeviceInfo::default());
        assert_eq!(image.dimensions(), (3 * MAX_UPSCALE_FACTOR, 2 * MAX_UPSCALE_FACTOR));
    }

    #[test]
    fn overlay_draws_only_when_enabled() {
        let frame = CalibratedFrame::new(Array2::zeros((20, 20)));
        let info = DeviceInfo::new(vec![
            ("Tcenter_point".into(), InfoValue::Point(10, 10)),
            ("Tcenter_C".into(), InfoValue::Float(30.)),
        ]);
        let mapper = ToneMapper::default();
        let mut config = plain(ToneMapStrategy::MinMaxStretch);
        let bare = mapper.render(&frame, &config, &info);
        config.draw_temperature_overlay = true;
        let marked = mapper.render(&frame, &config, &info);
        assert_eq!(*marked.get_pixel(13, 10), Rgb([255, 255, 0]));
        assert_ne!(*bare.get_pixel(13, 10), Rgb([255, 255, 0]));
    }

    #[test]
    fn enhancement_is_gated() {
        let frame = CalibratedFrame::new(Array2::from_shape_fn((16, 16), |(r, c)| ((r + c) % 5) as f32));
        let mapper = ToneMapper::default();
        let mut config = plain(ToneMapStrategy::HistogramEqualize);
        let a = mapper.render(&frame, &config, &DeviceInfo::default());
        let b = mapper.render(&frame, &config, &DeviceInfo::default());
        assert_eq!(a, b);
        config.luminance_contrast_enhance = true;
        let enhanced = mapper.render(&frame, &config, &DeviceInfo::default());
        assert_eq!(enhanced.dimensions(), a.dimensions());
    }
}
