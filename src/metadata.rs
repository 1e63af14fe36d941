//! Decode the metadata words that trail the pixel data.
//!
//! Devices hand out metadata in one of two shapes: a single
//! flat run of words following the pixels in the raw payload,
//! or several independent channels. Both decode into the same
//! channel-indexed [`MetadataSnapshot`]: a flat run is split
//! into rows of `row_width` words, while each channel becomes
//! one row. The flat case is simply channel 0 continued over
//! consecutive rows.

use anyhow::{ensure, Result};
use serde_derive::*;

/// `(row, column)` of a metadata field.
pub type FieldIndex = (usize, usize);

/// Metadata words as delivered by the device for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataWords {
    Flat(Vec<u16>),
    Channels(Vec<Vec<u16>>),
}

impl MetadataWords {
    /// Take the words after the first `pixel_words` entries of a
    /// raw sensor payload.
    pub fn from_payload(payload: &[u16], pixel_words: usize) -> Result<Self> {
        ensure!(
            payload.len() >= pixel_words,
            "payload has {} words, expected at least {} pixel words",
            payload.len(),
            pixel_words
        );
        Ok(MetadataWords::Flat(payload[pixel_words..].to_vec()))
    }

    pub fn decode(&self, row_width: usize) -> MetadataSnapshot {
        match self {
            MetadataWords::Flat(words) => decode(words, row_width),
            MetadataWords::Channels(channels) => decode_channels(channels),
        }
    }

    /// Total number of words.
    pub fn len(&self) -> usize {
        match self {
            MetadataWords::Flat(words) => words.len(),
            MetadataWords::Channels(channels) => channels.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetadataWords {
    fn default() -> Self {
        MetadataWords::Flat(vec![])
    }
}

/// Decoded metadata of one frame, addressable by
/// `(row, column)`.
///
/// Rows may be shorter than `row_width` (the tail of a flat
/// run, or short channels). Slots past the end of a row are
/// absent: they never compare equal or unequal to anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataSnapshot {
    rows: Vec<Vec<u16>>,
    row_width: usize,
    /// Rows are device channels rather than slices of one run.
    channels: bool,
}

/// Split a flat word sequence into rows of `row_width` words.
/// The last row may be short.
pub fn decode(words: &[u16], row_width: usize) -> MetadataSnapshot {
    let row_width = row_width.max(1);
    MetadataSnapshot {
        rows: words.chunks(row_width).map(<[u16]>::to_vec).collect(),
        row_width,
        channels: false,
    }
}

/// One row per channel. The nominal row width is that of the
/// longest channel.
pub fn decode_channels(channels: &[Vec<u16>]) -> MetadataSnapshot {
    let row_width = channels.iter().map(Vec::len).max().unwrap_or(0).max(1);
    MetadataSnapshot {
        rows: channels.to_vec(),
        row_width,
        channels: true,
    }
}

impl MetadataSnapshot {
    pub fn get(&self, (row, col): FieldIndex) -> Option<u16> {
        self.rows.get(row)?.get(col).copied()
    }

    /// Word at `index` counting across rows in order, as if the
    /// snapshot were one flat stream.
    pub fn word(&self, index: usize) -> Option<u16> {
        self.rows.iter().flatten().nth(index).copied()
    }

    /// Word `offset` of status line `line`. A channel is a line
    /// of its own; a flat run is cut into lines of `line_words`
    /// words.
    pub fn line_word(&self, line: usize, offset: usize, line_words: usize) -> Option<u16> {
        if self.channels {
            self.get((line, offset))
        } else {
            self.word(line.checked_mul(line_words)?.checked_add(offset)?)
        }
    }

    pub fn is_channels(&self) -> bool {
        self.channels
    }

    pub fn rows(&self) -> &[Vec<u16>] {
        &self.rows
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Number of present words in each row.
    pub fn shape(&self) -> Vec<usize> {
        self.rows.iter().map(Vec::len).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All present fields in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldIndex, u16)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row, words)| words.iter().enumerate().map(move |(col, &w)| ((row, col), w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_words_split_into_rows() {
        let words: Vec<u16> = (0..50).collect();
        let snap = decode(&words, 24);
        assert_eq!(snap.shape(), vec![24, 24, 2]);
        assert_eq!(snap.row_width(), 24);
        assert_eq!(snap.get((0, 0)), Some(0));
        assert_eq!(snap.get((2, 1)), Some(49));
        // short tail row is not padded
        assert_eq!(snap.get((2, 2)), None);
        assert_eq!(snap.get((3, 0)), None);
        assert_eq!(snap.word(25), Some(25));
        assert_eq!(snap.len(), 50);
    }

    #[test]
    fn channels_become_rows() {
        let snap = MetadataWords::Channels(vec![vec![1, 2, 3], vec![4]]).decode(24);
        assert_eq!(snap.shape(), vec![3, 1]);
        assert_eq!(snap.row_width(), 3);
        assert_eq!(snap.get((1, 0)), Some(4));
        assert_eq!(snap.get((1, 1)), None);
        assert_eq!(snap.word(3), Some(4));
        assert!(snap.is_channels());
    }

    #[test]
    fn status_lines_follow_the_decoded_form() {
        let channels = MetadataWords::Channels(vec![vec![10, 11], vec![20, 21]]).decode(24);
        assert_eq!(channels.line_word(1, 0, 256), Some(20));
        assert_eq!(channels.line_word(1, 1, 256), Some(21));
        assert_eq!(channels.line_word(1, 2, 256), None);

        let flat = decode(&(0..8).collect::<Vec<u16>>(), 2);
        assert!(!flat.is_channels());
        assert_eq!(flat.line_word(1, 1, 3), Some(4));
        assert_eq!(flat.line_word(usize::MAX, 1, 3), None);
    }

    #[test]
    fn iteration_is_row_major() {
        let snap = decode(&[10, 11, 12, 13, 14], 2);
        let order: Vec<_> = snap.iter().collect();
        assert_eq!(
            order,
            vec![((0, 0), 10), ((0, 1), 11), ((1, 0), 12), ((1, 1), 13), ((2, 0), 14)]
        );
    }

    #[test]
    fn payload_offset_skips_pixels() -> Result<()> {
        let payload: Vec<u16> = (0..10).collect();
        let words = MetadataWords::from_payload(&payload, 6)?;
        assert_eq!(words, MetadataWords::Flat(vec![6, 7, 8, 9]));
        assert!(MetadataWords::from_payload(&payload, 11).is_err());
        Ok(())
    }

    #[test]
    fn zero_row_width_is_treated_as_one() {
        assert_eq!(decode(&[1, 2], 0).shape(), vec![1, 1]);
        assert!(decode(&[], 24).is_empty());
    }
}
