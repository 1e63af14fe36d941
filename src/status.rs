//! Status text shown next to the rendered frame.
//!
//! The layout is fixed so that it can be compared byte for
//! byte:
//!
//! ```text
//!          0    1    2    3           <- column header (verbose)
//! 0000: 4142 0001 7f20 ffff | BA.. ... <- metadata hex dump (verbose)
//! min: 1.000000                        <- raw frame (verbose)
//! max: 5.000000
//! min: -1.000000                       <- after baseline (verbose)
//! max: 2.000000
//! meta[0] = 0:16706, 1:1               <- selected fields (verbose)
//! waiting to calibrate... 12...        <- while arming
//! calibrating...                       <- within a calibration cycle
//! error: ...                           <- last tick error
//! meta[2,5] changed from ...           <- change history (verbose)
//! Tmin_C:              20.50           <- device info
//! ```

use itertools::Itertools;

use crate::{
    calibration::CalibrationState,
    config::StatusField,
    device::DeviceInfo,
    diff::ChangeEvent,
    frame::FrameStats,
    metadata::MetadataSnapshot,
};

/// Everything the status text is made of, as of the end of a
/// tick.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub calibration: CalibrationState,
    /// Within the frame window of a calibration cycle.
    pub calibrating: bool,
    pub raw_stats: FrameStats,
    pub calibrated_stats: FrameStats,
    pub metadata: MetadataSnapshot,
    /// Newest last.
    pub history: Vec<ChangeEvent>,
    pub info: DeviceInfo,
    pub error: Option<String>,
}

impl StatusReport {
    /// Render the status text. Without `verbose` only the
    /// calibration lines and the device info are included.
    pub fn text(&self, fields: &[StatusField], line_words: usize, verbose: bool) -> String {
        let mut s = String::new();
        if verbose {
            s.push_str(&hex_dump(&self.metadata));
            for stats in [self.raw_stats, self.calibrated_stats].iter() {
                s.push_str(&format!("min: {:.6}\nmax: {:.6}\n", stats.min, stats.max));
            }
            for field in fields {
                s.push_str(&selected_field(&self.metadata, field, line_words));
            }
        }
        if let CalibrationState::Arming { countdown } = self.calibration {
            s.push_str(&format!("waiting to calibrate... {}...\n", countdown));
        }
        if self.calibrating {
            s.push_str("calibrating...\n");
        }
        if let Some(error) = &self.error {
            s.push_str(&format!("error: {}\n", error));
        }
        if verbose {
            s.push_str(&self.history.iter().join("\n"));
            s.push('\n');
        }
        for (key, value) in self.info.iter() {
            s.push_str(&format!("{:<18} {}\n", format!("{}:", key), value));
        }
        s
    }
}

/// Column header followed by one line per metadata row: byte
/// address, the words in hex and the words as ASCII (low byte
/// first).
pub fn hex_dump(snapshot: &MetadataSnapshot) -> String {
    let width = snapshot.row_width();
    let mut s = String::from("     ");
    for column in 0..width {
        s.push_str(&format!(" {:4}", column));
    }
    s.push('\n');

    let mut address = 0;
    for row in snapshot.rows() {
        s.push_str(&format!("{:04x}:", address));
        for word in row {
            s.push_str(&format!(" {:04x}", word));
        }
        for _ in row.len()..width {
            s.push_str("     ");
        }
        s.push_str(" | ");
        for &word in row {
            s.push(ascii(word as u8));
            s.push(ascii((word >> 8) as u8));
        }
        s.push('\n');
        address += 2 * row.len();
    }
    s
}

fn ascii(byte: u8) -> char {
    if (0x20..=0x7e).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

/// `meta[L] = o:v, o:v, ...`. A flat stream is addressed as
/// `L * line_words + o`, channel metadata as channel `L`, word
/// `o`. Missing words print as `-`.
fn selected_field(snapshot: &MetadataSnapshot, field: &StatusField, line_words: usize) -> String {
    let values = field
        .offsets
        .iter()
        .map(|&offset| {
            let value = snapshot
                .line_word(field.line, offset, line_words)
                .map_or_else(|| "-".to_string(), |w| w.to_string());
            format!("{}:{}", offset, value)
        })
        .join(", ");
    format!("meta[{}] = {}\n", field.line, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::InfoValue,
        metadata::{decode, MetadataWords},
    };

    fn report() -> StatusReport {
        StatusReport {
            calibration: CalibrationState::Capturing { frame_index: 3 },
            calibrating: true,
            raw_stats: FrameStats { min: 1., max: 5. },
            calibrated_stats: FrameStats { min: -1., max: 2. },
            metadata: decode(&[0x4142, 0x0001, 0x7f20, 0xffff, 0x0030], 4),
            history: vec![ChangeEvent {
                row: 2,
                column: 5,
                previous: 1,
                current: 2,
            }],
            info: DeviceInfo::new(vec![
                ("Tmin_C".into(), InfoValue::Float(20.5)),
                ("frame".into(), InfoValue::Int(7)),
                ("Tmin_point".into(), InfoValue::Point(1, 2)),
            ]),
            error: None,
        }
    }

    fn fields() -> Vec<StatusField> {
        vec![
            StatusField {
                line: 0,
                offsets: vec![0, 1],
            },
            StatusField {
                line: 1,
                offsets: vec![0, 3],
            },
        ]
    }

    const INFO: &str = "Tmin_C:              20.50\n\
                        frame:             7\n\
                        Tmin_point:        (1, 2)\n";

    #[test]
    fn verbose_text_is_exact() {
        let expected = [
            "         0    1    2    3\n",
            "0000: 4142 0001 7f20 ffff | BA.. ...\n",
            "0008: 0030                | 0.\n",
            "min: 1.000000\nmax: 5.000000\n",
            "min: -1.000000\nmax: 2.000000\n",
            "meta[0] = 0:16706, 1:1\n",
            "meta[1] = 0:48, 3:-\n",
            "calibrating...\n",
            "meta[2,5] changed from 0x0001=1 to 0x0002=2\n",
            INFO,
        ]
        .concat();
        assert_eq!(report().text(&fields(), 4, true), expected);
    }

    #[test]
    fn selected_fields_read_channels_by_line() {
        let report = StatusReport {
            metadata: MetadataWords::Channels(vec![vec![10, 11], vec![20, 21]]).decode(24),
            history: vec![],
            info: DeviceInfo::default(),
            ..report()
        };
        let field = StatusField {
            line: 1,
            offsets: vec![0, 1, 2],
        };
        let expected = [
            "         0    1\n",
            "0000: 000a 000b | ....\n",
            "0004: 0014 0015 | ....\n",
            "min: 1.000000\nmax: 5.000000\n",
            "min: -1.000000\nmax: 2.000000\n",
            "meta[1] = 0:20, 1:21, 2:-\n",
            "calibrating...\n",
            "\n",
        ]
        .concat();
        assert_eq!(report.text(&[field], 256, true), expected);
    }

    #[test]
    fn quiet_text_keeps_calibration_and_info() {
        let mut report = report();
        report.calibration = CalibrationState::Arming { countdown: 12 };
        report.calibrating = false;
        report.error = Some("boom".into());
        let expected = ["waiting to calibrate... 12...\n", "error: boom\n", INFO].concat();
        assert_eq!(report.text(&fields(), 4, false), expected);
    }

    #[test]
    fn empty_history_leaves_blank_line() {
        let report = StatusReport {
            history: vec![],
            info: DeviceInfo::default(),
            ..report()
        };
        assert!(report.text(&[], 4, true).ends_with("calibrating...\n\n"));
    }
}
