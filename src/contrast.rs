//! Histogram based contrast operations.
//!
//! [`equalize_histogram`] works on the float frame before
//! colouring; [`enhance_luminance_contrast`] works on the
//! coloured image, equalising the lightness channel in tiles
//! (CLAHE) while leaving chroma alone.

use image::{Rgb, RgbImage};
use itertools::iproduct;
use ndarray::Array2;
use serde_derive::*;

const BINS: usize = 256;

/// Global histogram equalisation.
///
/// Builds a 256-bin histogram over the observed value range
/// and maps each value through the normalised cumulative
/// histogram, interpolated linearly between bin centres.
/// Output lies in `[0, 1]`. A constant frame maps to zeros.
pub fn equalize_histogram(values: &Array2<f32>) -> Array2<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(max > min) {
        return Array2::zeros(values.dim());
    }

    let (min, max) = (min as f64, max as f64);
    let bin_width = (max - min) / BINS as f64;
    let mut hist = [0u64; BINS];
    for &v in values.iter() {
        let bin = ((v as f64 - min) / bin_width) as usize;
        hist[bin.min(BINS - 1)] += 1;
    }

    let total = values.len() as f64;
    let mut cdf = [0f64; BINS];
    let mut acc = 0u64;
    for (c, &h) in cdf.iter_mut().zip(hist.iter()) {
        acc += h;
        *c = acc as f64 / total;
    }

    values.mapv(|v| {
        // position in units of bins, relative to the first centre
        let pos = (v as f64 - min) / bin_width - 0.5;
        if pos <= 0. {
            return cdf[0] as f32;
        }
        let lo = pos.floor() as usize;
        if lo >= BINS - 1 {
            return cdf[BINS - 1] as f32;
        }
        let t = pos - lo as f64;
        (cdf[lo] * (1. - t) + cdf[lo + 1] * t) as f32
    })
}

/// Parameters of contrast limited adaptive histogram
/// equalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheSettings {
    /// Histogram clip limit, relative to a flat histogram.
    pub clip_limit: f64,
    /// Number of tiles along each axis.
    pub grid: u32,
}

impl Default for ClaheSettings {
    fn default() -> Self {
        ClaheSettings {
            clip_limit: 2.0,
            grid: 8,
        }
    }
}

/// Equalise lightness in tiles, keeping each pixel's chroma.
pub fn enhance_luminance_contrast(image: &RgbImage, settings: &ClaheSettings) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let lab: Vec<[f64; 3]> = image.pixels().map(|p| rgb_to_lab(*p)).collect();
    let lightness: Vec<u8> = lab
        .iter()
        .map(|l| (l[0] * 255. / 100.).round().max(0.).min(255.) as u8)
        .collect();

    let equalized = clahe(&lightness, width as usize, height as usize, settings);

    let mut out = RgbImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        let [_, a, b] = lab[i];
        *pixel = lab_to_rgb([equalized[i] as f64 * 100. / 255., a, b]);
    }
    out
}

struct TileGrid {
    count: usize,
    size: usize,
}

impl TileGrid {
    fn new(extent: usize, grid: usize) -> Self {
        let wanted = grid.max(1).min(extent);
        let size = (extent + wanted - 1) / wanted;
        TileGrid {
            count: (extent + size - 1) / size,
            size,
        }
    }

    /// Neighbouring tiles and the weight of the second one.
    fn neighbours(&self, pos: usize) -> (usize, usize, f64) {
        let t = (pos as f64 + 0.5) / self.size as f64 - 0.5;
        if t <= 0. {
            return (0, 0, 0.);
        }
        let lo = (t.floor() as usize).min(self.count - 1);
        let hi = (lo + 1).min(self.count - 1);
        (lo, hi, t - lo as f64)
    }
}

fn clahe(channel: &[u8], width: usize, height: usize, settings: &ClaheSettings) -> Vec<u8> {
    let tiles_x = TileGrid::new(width, settings.grid as usize);
    let tiles_y = TileGrid::new(height, settings.grid as usize);

    let luts: Vec<[u8; BINS]> = iproduct!(0..tiles_y.count, 0..tiles_x.count)
        .map(|(ty, tx)| {
            let xs = tx * tiles_x.size..((tx + 1) * tiles_x.size).min(width);
            let ys = ty * tiles_y.size..((ty + 1) * tiles_y.size).min(height);
            let mut hist = [0u32; BINS];
            for (y, x) in iproduct!(ys, xs) {
                hist[channel[y * width + x] as usize] += 1;
            }
            tile_lut(&mut hist, settings.clip_limit)
        })
        .collect();
    let lut = |ty: usize, tx: usize| &luts[ty * tiles_x.count + tx];

    let mut out = vec![0u8; channel.len()];
    for y in 0..height {
        let (y0, y1, fy) = tiles_y.neighbours(y);
        for x in 0..width {
            let (x0, x1, fx) = tiles_x.neighbours(x);
            let v = channel[y * width + x] as usize;
            let top = lut(y0, x0)[v] as f64 * (1. - fx) + lut(y0, x1)[v] as f64 * fx;
            let bottom = lut(y1, x0)[v] as f64 * (1. - fx) + lut(y1, x1)[v] as f64 * fx;
            out[y * width + x] = (top * (1. - fy) + bottom * fy).round() as u8;
        }
    }
    out
}

fn tile_lut(hist: &mut [u32; BINS], clip_limit: f64) -> [u8; BINS] {
    let area: u32 = hist.iter().sum();
    let mut lut = [0u8; BINS];
    if area == 0 {
        return lut;
    }

    let limit = ((clip_limit * area as f64 / BINS as f64) as u32).max(1);
    let mut excess = 0;
    for h in hist.iter_mut() {
        if *h > limit {
            excess += *h - limit;
            *h = limit;
        }
    }
    let spread = excess / BINS as u32;
    let remainder = (excess % BINS as u32) as usize;
    for (i, h) in hist.iter_mut().enumerate() {
        *h += spread + (i < remainder) as u32;
    }

    let scale = 255. / area as f64;
    let mut acc = 0;
    for (entry, &h) in lut.iter_mut().zip(hist.iter()) {
        acc += h;
        *entry = (acc as f64 * scale).round().min(255.) as u8;
    }
    lut
}

// sRGB (D65) <-> CIE L*a*b*

const WHITE: [f64; 3] = [0.950_456, 1.0, 1.088_754];

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f64) -> u8 {
    let c = c.max(0.).min(1.);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1. / 2.4) - 0.055
    };
    (s * 255.).round().max(0.).min(255.) as u8
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6. / 29.;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3. * DELTA * DELTA) + 4. / 29.
    }
}

fn lab_f_inv(t: f64) -> f64 {
    const DELTA: f64 = 6. / 29.;
    if t > DELTA {
        t * t * t
    } else {
        3. * DELTA * DELTA * (t - 4. / 29.)
    }
}

fn rgb_to_lab(Rgb([r, g, b]): Rgb<u8>) -> [f64; 3] {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
    let x = 0.412_453 * r + 0.357_580 * g + 0.180_423 * b;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = 0.019_334 * r + 0.119_193 * g + 0.950_227 * b;
    let (fx, fy, fz) = (lab_f(x / WHITE[0]), lab_f(y / WHITE[1]), lab_f(z / WHITE[2]));
    [116. * fy - 16., 500. * (fx - fy), 200. * (fy - fz)]
}

fn lab_to_rgb([l, a, b]: [f64; 3]) -> Rgb<u8> {
    let fy = (l + 16.) / 116.;
    let x = WHITE[0] * lab_f_inv(fy + a / 500.);
    let y = WHITE[1] * lab_f_inv(fy);
    let z = WHITE[2] * lab_f_inv(fy - b / 200.);
    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
    let b = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;
    Rgb([linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b)])
}
