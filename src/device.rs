//! The capture device as seen by the pipeline.
//!
//! [`ThermalDevice`] is the boundary to the hardware driver.
//! [`ReplayDevice`] implements it over recorded snapshot files,
//! which is what the bundled binaries use.

use std::{fmt, path::Path};

use anyhow::{anyhow, bail, Result};
use itertools::Itertools;
use tracing::{debug, info};

use crate::{frame::RawFrame, metadata::MetadataWords, persist::load_snapshot};

/// One acquisition: the pixel grid and the metadata words that
/// came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    pub frame: RawFrame,
    pub metadata: MetadataWords,
}

impl RawCapture {
    /// Split a raw sensor payload of `height * width` pixel
    /// words followed by metadata words.
    pub fn from_payload(payload: &[u16], width: usize, height: usize) -> Result<Self> {
        let pixel_words = width * height;
        let metadata = MetadataWords::from_payload(payload, pixel_words)?;
        let frame = RawFrame::from_shape_vec(height, width, payload[..pixel_words].to_vec())?;
        Ok(RawCapture { frame, metadata })
    }
}

/// Device driver operations used by the pipeline.
///
/// Mode commands are fire-and-forget: the pipeline logs their
/// failures and carries on.
pub trait ThermalDevice {
    fn read(&mut self) -> Result<RawCapture>;
    fn info(&mut self) -> Result<DeviceInfo>;
    /// Close the shutter and recalibrate the sensor.
    fn calibrate(&mut self) -> Result<()>;
    fn temperature_range_normal(&mut self) -> Result<()>;
    fn temperature_range_high(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// A named value reported by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Float(f64),
    Int(i64),
    /// `(x, y)` pixel position in the sensor frame.
    Point(u32, u32),
    Text(String),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Float(v) => write!(f, "{:7.2}", v),
            InfoValue::Int(v) => write!(f, "{}", v),
            InfoValue::Point(x, y) => write!(f, "({}, {})", x, y),
            InfoValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// Named diagnostic values plus the device's raw-to-temperature
/// lookup table (may be empty).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    values: Vec<(String, InfoValue)>,
    lut: Vec<f32>,
}

impl DeviceInfo {
    pub fn new(values: Vec<(String, InfoValue)>) -> Self {
        DeviceInfo { values, lut: vec![] }
    }

    pub fn with_lut(mut self, lut: Vec<f32>) -> Self {
        self.lut = lut;
        self
    }

    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Numeric value of `key`; integers are widened.
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            InfoValue::Float(v) => Some(*v),
            InfoValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn point(&self, key: &str) -> Option<(u32, u32)> {
        match self.get(key)? {
            InfoValue::Point(x, y) => Some((*x, *y)),
            _ => None,
        }
    }

    /// Entries in the order the device reported them.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn lut(&self) -> &[f32] {
        &self.lut
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Raw units per kelvin of the replayed sensors.
const RAW_PER_KELVIN: f64 = 64.;
const KELVIN_OFFSET: f64 = 273.15;

pub fn raw_to_celsius(raw: u16) -> f64 {
    raw as f64 / RAW_PER_KELVIN - KELVIN_OFFSET
}

/// Plays back recorded snapshots as if they came from a
/// camera.
#[derive(Debug)]
pub struct ReplayDevice {
    captures: Vec<RawCapture>,
    next: usize,
    looping: bool,
    info: DeviceInfo,
}

impl ReplayDevice {
    pub fn new(captures: Vec<RawCapture>, looping: bool) -> Self {
        ReplayDevice {
            captures,
            next: 0,
            looping,
            info: DeviceInfo::default(),
        }
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P], looping: bool) -> Result<Self> {
        let captures = paths
            .iter()
            .map(|p| load_snapshot(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(captures, looping))
    }

    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.next >= self.captures.len()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

impl ThermalDevice for ReplayDevice {
    fn read(&mut self) -> Result<RawCapture> {
        if self.captures.is_empty() {
            bail!("no recorded frames to replay");
        }
        if self.next >= self.captures.len() {
            if !self.looping {
                bail!("replay exhausted after {} frames", self.captures.len());
            }
            self.next = 0;
        }
        let capture = self.captures[self.next].clone();
        self.info = frame_info(&capture.frame, self.next)?;
        self.next += 1;
        Ok(capture)
    }

    fn info(&mut self) -> Result<DeviceInfo> {
        Ok(self.info.clone())
    }

    fn calibrate(&mut self) -> Result<()> {
        info!("replay: calibrate");
        Ok(())
    }

    fn temperature_range_normal(&mut self) -> Result<()> {
        info!("replay: normal temperature range");
        Ok(())
    }

    fn temperature_range_high(&mut self) -> Result<()> {
        info!("replay: high temperature range");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        debug!(frames = self.captures.len(), "replay released");
        Ok(())
    }
}

/// Min, max and centre readings of a frame in the layout a
/// camera driver reports them.
pub fn frame_info(frame: &RawFrame, index: usize) -> Result<DeviceInfo> {
    let (height, width) = frame.dim();
    let indexed = || {
        frame
            .pixels()
            .indexed_iter()
            .map(|((row, col), &v)| ((col as u32, row as u32), v))
    };
    let (min_point, min) = indexed()
        .min_by_key(|&(_, v)| v)
        .ok_or_else(|| anyhow!("empty frame"))?;
    let (max_point, max) = indexed()
        .max_by_key(|&(_, v)| v)
        .ok_or_else(|| anyhow!("empty frame"))?;
    let center_point = ((width / 2) as u32, (height / 2) as u32);
    let center = frame.pixels()[(height / 2, width / 2)];

    let point = |(x, y): (u32, u32)| InfoValue::Point(x, y);
    let celsius = |raw: u16| InfoValue::Float(raw_to_celsius(raw));
    let values = vec![
        ("Tmin_point", point(min_point)),
        ("Tmin_C", celsius(min)),
        ("Tmax_point", point(max_point)),
        ("Tmax_C", celsius(max)),
        ("Tcenter_point", point(center_point)),
        ("Tcenter_C", celsius(center)),
        ("frame", InfoValue::Int(index as i64)),
        ("resolution", InfoValue::Text(format!("{}x{}", width, height))),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect_vec();
    Ok(DeviceInfo::new(values))
}
