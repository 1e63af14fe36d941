//! Snapshot files and timestamped file names.
//!
//! A snapshot stores one [`RawCapture`] in a small
//! little-endian container:
//!
//! - 0x0: magic "THRM"
//! - 0x4: u16 format version (= 1)
//! - 0x6: u32 width, u32 height
//! - 0xe: u8 metadata kind: 0 = flat, 1 = channels
//! - 0xf: u32 channel count, then one u32 length per channel
//! - ..: `width * height` u16 pixels, row-major
//! - ..: metadata u16 words, channel after channel

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use byteordered::ByteOrdered;
use chrono::NaiveDateTime;
use image::RgbImage;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{device::RawCapture, frame::RawFrame, metadata::MetadataWords};

const MAGIC: &[u8; 4] = b"THRM";
const VERSION: u16 = 1;
pub const SNAPSHOT_EXTENSION: &str = "raw";

pub fn write_snapshot<W: Write>(writer: W, capture: &RawCapture) -> Result<()> {
    let mut wtr = ByteOrdered::le(writer);
    wtr.write_all(MAGIC)?;
    wtr.write_u16(VERSION)?;
    let (height, width) = capture.frame.dim();
    wtr.write_u32(width as u32)?;
    wtr.write_u32(height as u32)?;

    let channels: Vec<&[u16]> = match &capture.metadata {
        MetadataWords::Flat(words) => {
            wtr.write_u8(0)?;
            vec![words.as_slice()]
        }
        MetadataWords::Channels(channels) => {
            wtr.write_u8(1)?;
            channels.iter().map(Vec::as_slice).collect()
        }
    };
    wtr.write_u32(channels.len() as u32)?;
    for c in channels.iter() {
        wtr.write_u32(c.len() as u32)?;
    }

    for &px in capture.frame.pixels().iter() {
        wtr.write_u16(px)?;
    }
    for &word in channels.iter().flat_map(|c| c.iter()) {
        wtr.write_u16(word)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_snapshot<R: Read>(reader: R) -> Result<RawCapture> {
    let mut rdr = ByteOrdered::le(reader);
    let mut magic = [0u8; 4];
    rdr.read_exact(&mut magic).context("reading magic")?;
    ensure!(&magic == MAGIC, "not a snapshot file: bad magic {:?}", magic);
    let version = rdr.read_u16()?;
    ensure!(version == VERSION, "unsupported snapshot version {}", version);

    let width = rdr.read_u32()? as usize;
    let height = rdr.read_u32()? as usize;
    let kind = rdr.read_u8()?;
    let num_channels = rdr.read_u32()? as usize;
    let lengths = (0..num_channels)
        .map(|_| Ok(rdr.read_u32()? as usize))
        .collect::<Result<Vec<_>>>()?;

    let mut read_words = |n: usize| -> Result<Vec<u16>> {
        (0..n).map(|_| Ok(rdr.read_u16()?)).collect()
    };
    let pixels = read_words(width * height).context("reading pixels")?;
    let frame = RawFrame::from_shape_vec(height, width, pixels)?;

    let channels = lengths
        .iter()
        .map(|&n| read_words(n))
        .collect::<Result<Vec<_>>>()
        .context("reading metadata")?;
    let metadata = match kind {
        0 => {
            ensure!(channels.len() == 1, "flat metadata with {} channels", channels.len());
            MetadataWords::Flat(channels.into_iter().flatten().collect())
        }
        1 => MetadataWords::Channels(channels),
        k => bail!("unknown metadata kind {}", k),
    };

    Ok(RawCapture { frame, metadata })
}

pub fn save_snapshot(path: &Path, capture: &RawCapture) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_snapshot(BufWriter::new(file), capture)
}

pub fn load_snapshot(path: &Path) -> Result<RawCapture> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_snapshot(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

/// `YYYY-MM-DD_HH-MM-SS.raw`
pub fn snapshot_file_name(at: &NaiveDateTime) -> String {
    format!("{}.{}", at.format("%Y-%m-%d_%H-%M-%S"), SNAPSHOT_EXTENSION)
}

/// `YYYY-MM-DD_HH:MM:SS.png`
pub fn rendered_file_name(at: &NaiveDateTime) -> String {
    format!("{}.png", at.format("%Y-%m-%d_%H:%M:%S"))
}

/// `YYYY-MM-DD_HH:MM:SS_calibNN.png`
pub fn calibration_file_name(at: &NaiveDateTime, frame_index: u32) -> String {
    format!("{}_calib{:02}.png", at.format("%Y-%m-%d_%H:%M:%S"), frame_index)
}

pub fn is_snapshot_file_name(name: &str) -> bool {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}\.raw$").unwrap();
    }
    RE.is_match(name)
}

/// Snapshot files directly inside `dir`, sorted by name (and so
/// by capture time).
pub fn snapshot_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, is_snapshot_file_name);
        if is_snapshot {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 42))
            .unwrap()
    }

    fn capture(metadata: MetadataWords) -> Result<RawCapture> {
        Ok(RawCapture {
            frame: RawFrame::from_shape_vec(2, 3, vec![0, 1, 2, 300, 65535, 7])?,
            metadata,
        })
    }

    #[test]
    fn snapshot_round_trip() -> Result<()> {
        for metadata in vec![
            MetadataWords::Flat(vec![0x1234, 0xffff, 0]),
            MetadataWords::Channels(vec![vec![1, 2], vec![], vec![3]]),
        ] {
            let original = capture(metadata)?;
            let mut buf = vec![];
            write_snapshot(&mut buf, &original)?;
            assert_eq!(&buf[..4], b"THRM");
            assert_eq!(read_snapshot(Cursor::new(buf))?, original);
        }
        Ok(())
    }

    #[test]
    fn truncated_snapshot_fails() -> Result<()> {
        let mut buf = vec![];
        write_snapshot(&mut buf, &capture(MetadataWords::Flat(vec![9; 4]))?)?;
        buf.truncate(buf.len() - 3);
        assert!(read_snapshot(Cursor::new(buf)).is_err());
        assert!(read_snapshot(Cursor::new(b"JUNKJUNK".to_vec())).is_err());
        Ok(())
    }

    #[test]
    fn file_names() {
        let at = timestamp();
        assert_eq!(snapshot_file_name(&at), "2024-03-09_07-05-42.raw");
        assert_eq!(rendered_file_name(&at), "2024-03-09_07:05:42.png");
        assert_eq!(calibration_file_name(&at, 7), "2024-03-09_07:05:42_calib07.png");
        assert!(is_snapshot_file_name(&snapshot_file_name(&at)));
        assert!(!is_snapshot_file_name("2024-03-09_07:05:42.png"));
    }

    #[test]
    fn snapshots_on_disk() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("thermal-persist-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let original = capture(MetadataWords::Flat(vec![5, 6]))?;
        let path = dir.join(snapshot_file_name(&timestamp()));
        save_snapshot(&path, &original)?;
        std::fs::write(dir.join("notes.txt"), "x")?;

        assert_eq!(snapshot_files_in(&dir)?, vec![path.clone()]);
        assert_eq!(load_snapshot(&path)?, original);
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
