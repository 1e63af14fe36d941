//! Fixed 256-entry colour lookup tables.

use image::Rgb;
use lazy_static::lazy_static;
use serde_derive::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    /// Blue → cyan → yellow → red ramp.
    Jet,
    /// Black → purple → orange → pale yellow ramp.
    Inferno,
}

impl Palette {
    pub fn lut(self) -> &'static [Rgb<u8>; 256] {
        match self {
            Palette::Jet => &JET,
            Palette::Inferno => &INFERNO,
        }
    }

    #[inline]
    pub fn color(self, level: u8) -> Rgb<u8> {
        self.lut()[level as usize]
    }
}

lazy_static! {
    static ref JET: [Rgb<u8>; 256] = build_lut(jet);
    static ref INFERNO: [Rgb<u8>; 256] = build_lut(inferno);
}

fn build_lut(f: fn(f64) -> [f64; 3]) -> [Rgb<u8>; 256] {
    let mut lut = [Rgb([0, 0, 0]); 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let [r, g, b] = f(i as f64 / 255.);
        *entry = Rgb([to_u8(r), to_u8(g), to_u8(b)]);
    }
    lut
}

fn to_u8(v: f64) -> u8 {
    (v.max(0.).min(1.) * 255.).round() as u8
}

// piecewise linear, each channel a clipped tent
fn jet(x: f64) -> [f64; 3] {
    let tent = |centre: f64| (1.5 - (4. * x - centre).abs()).max(0.).min(1.);
    [tent(3.), tent(2.), tent(1.)]
}

// sampled every 16 levels, linear in between
const INFERNO_STOPS: [[u8; 3]; 17] = [
    [0, 0, 4],
    [11, 7, 36],
    [29, 12, 69],
    [51, 15, 97],
    [74, 12, 107],
    [96, 19, 110],
    [118, 28, 109],
    [140, 36, 105],
    [163, 43, 97],
    [184, 55, 84],
    [203, 70, 71],
    [220, 88, 55],
    [234, 110, 37],
    [245, 135, 20],
    [250, 164, 10],
    [249, 196, 40],
    [252, 255, 164],
];

fn inferno(x: f64) -> [f64; 3] {
    let pos = x * (INFERNO_STOPS.len() - 1) as f64;
    let lo = (pos.floor() as usize).min(INFERNO_STOPS.len() - 2);
    let t = pos - lo as f64;
    let (a, b) = (INFERNO_STOPS[lo], INFERNO_STOPS[lo + 1]);
    let mix = |i: usize| (a[i] as f64 * (1. - t) + b[i] as f64 * t) / 255.;
    [mix(0), mix(1), mix(2)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jet_endpoints() {
        assert_eq!(Palette::Jet.color(0), Rgb([0, 0, 128]));
        assert_eq!(Palette::Jet.color(255), Rgb([128, 0, 0]));
        let mid = Palette::Jet.color(128);
        assert_eq!(mid[1], 255);
    }

    #[test]
    fn inferno_endpoints() {
        assert_eq!(Palette::Inferno.color(0), Rgb([0, 0, 4]));
        assert_eq!(Palette::Inferno.color(255), Rgb([252, 255, 164]));
    }

    #[test]
    fn inferno_brightens_monotonically() {
        let luma = |p: Rgb<u8>| p[0] as u32 + p[1] as u32 + p[2] as u32;
        let lut = Palette::Inferno.lut();
        assert!(lut.windows(2).all(|w| luma(w[0]) <= luma(w[1]) + 2));
    }
}
