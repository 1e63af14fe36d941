//! Temperature markers drawn over the rendered image.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::debug;

use crate::{
    device::DeviceInfo,
    geometry::{project_point, Orientation},
};

/// A point of interest reported by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Pixel position in the unrotated sensor frame.
    pub point: (u32, u32),
    pub celsius: f64,
    pub color: Rgb<u8>,
}

/// Point/temperature key pairs and their marker colours.
const MARKERS: [(&str, &str, [u8; 3]); 3] = [
    ("Tmin_point", "Tmin_C", [0, 0, 55]),
    ("Tmax_point", "Tmax_C", [85, 0, 0]),
    ("Tcenter_point", "Tcenter_C", [255, 255, 0]),
];

/// Collect the min, max and centre markers from the device
/// info. Missing entries are skipped.
pub fn markers_from_info(info: &DeviceInfo) -> Vec<Marker> {
    MARKERS
        .iter()
        .filter_map(
            |&(point_key, temp_key, color)| match (info.point(point_key), info.float(temp_key)) {
                (Some(point), Some(celsius)) => Some(Marker {
                    point,
                    celsius,
                    color: Rgb(color),
                }),
                _ => {
                    debug!(point_key, "marker missing from device info");
                    None
                }
            },
        )
        .collect()
}

// crosshair arms span this many pixels from the centre
const ARM_START: i64 = 2;
const ARM_END: i64 = 5;

/// Draw markers onto an image that was rotated by
/// `orientation` and upscaled by `factor` from a sensor frame
/// of `source_dims` (width, height).
pub fn draw_markers(
    image: &mut RgbImage,
    markers: &[Marker],
    source_dims: (u32, u32),
    orientation: Orientation,
    factor: u32,
) {
    for marker in markers {
        let (x, y) = marker.point;
        if x >= source_dims.0 || y >= source_dims.1 {
            debug!(point = ?marker.point, "marker outside of frame");
            continue;
        }
        let (cx, cy) = project_point(marker.point, source_dims, orientation, factor);
        let (cx, cy) = (cx as i64, cy as i64);
        for &(dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)].iter() {
            let at = |d: i64| ((cx + dx * d) as f32, (cy + dy * d) as f32);
            draw_line_segment_mut(image, at(ARM_START), at(ARM_END), marker.color);
        }
        let label = format!("{:.1}C", marker.celsius);
        draw_text(
            image,
            &label,
            (cx + ARM_START + 1, cy - ARM_START - 1 - GLYPH_HEIGHT),
            marker.color,
        );
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
        image.put_pixel(x as u32, y as u32, color);
    }
}

const GLYPH_WIDTH: i64 = 3;
const GLYPH_HEIGHT: i64 = 5;

/// Rows of a 3x5 glyph, most significant of the low three
/// bits is the leftmost column.
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        _ => return None,
    })
}

/// Draw `text` with its top-left corner at `origin`.
/// Characters without a glyph leave a gap.
pub fn draw_text(image: &mut RgbImage, text: &str, origin: (i64, i64), color: Rgb<u8>) {
    let (ox, oy) = origin;
    for (i, c) in text.chars().enumerate() {
        let left = ox + i as i64 * (GLYPH_WIDTH + 1);
        let rows = match glyph(c) {
            Some(rows) => rows,
            None => continue,
        };
        for (dy, bits) in rows.iter().enumerate() {
            for dx in 0..GLYPH_WIDTH {
                if bits & (0b100 >> dx) != 0 {
                    put(image, left + dx, oy + dy as i64, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InfoValue;

    fn info() -> DeviceInfo {
        DeviceInfo::new(vec![
            ("Tmin_point".into(), InfoValue::Point(0, 0)),
            ("Tmin_C".into(), InfoValue::Float(20.5)),
            ("Tmax_point".into(), InfoValue::Point(9, 9)),
            ("Tmax_C".into(), InfoValue::Float(36.6)),
            ("frame".into(), InfoValue::Int(12)),
        ])
    }

    #[test]
    fn markers_need_point_and_temperature() {
        let markers = markers_from_info(&info());
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].point, (9, 9));
        assert_eq!(markers[1].color, Rgb([85, 0, 0]));
    }

    #[test]
    fn crosshair_is_drawn_at_projected_position() {
        let mut image = RgbImage::new(40, 40);
        let marker = Marker {
            point: (5, 5),
            celsius: 1.0,
            color: Rgb([255, 255, 0]),
        };
        draw_markers(&mut image, &[marker], (20, 20), Orientation::Deg0, 2);
        // centre of block (5, 5) at factor 2 is (11, 11)
        assert_eq!(*image.get_pixel(11 + 3, 11), Rgb([255, 255, 0]));
        assert_eq!(*image.get_pixel(11, 11 + 5), Rgb([255, 255, 0]));
        assert_eq!(*image.get_pixel(11 - 2, 11), Rgb([255, 255, 0]));
        assert_eq!(*image.get_pixel(11, 11 - 5), Rgb([255, 255, 0]));
        // the centre and the space past the arms stay clear
        assert_eq!(*image.get_pixel(11, 11), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(11 + 1, 11), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(11 + 6, 11), Rgb([0, 0, 0]));
    }

    #[test]
    fn markers_near_edges_are_clipped() {
        let mut image = RgbImage::new(4, 4);
        let markers = markers_from_info(&info());
        draw_markers(&mut image, &markers, (10, 10), Orientation::Deg90, 1);
        draw_markers(&mut image, &markers, (2, 2), Orientation::Deg0, 1);
    }

    #[test]
    fn text_uses_glyph_bitmaps() {
        let mut image = RgbImage::new(8, 6);
        draw_text(&mut image, "1", (0, 0), Rgb([1, 2, 3]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([1, 2, 3]));
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(0, 4), Rgb([1, 2, 3]));
    }
}
