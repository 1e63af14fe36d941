//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs to
//! mention what it changes:
//!
//! ```json
//! {
//!     "calibration": { "warmup_frames": 20 },
//!     "render": { "tone_map": "min_max_stretch", "orientation": 90 },
//!     "autosave_dir": "calib"
//! }
//! ```

use std::{collections::BTreeSet, fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde_derive::*;

use crate::{
    calibration::CalibrationSettings,
    contrast::ClaheSettings,
    error::{PipelineError, PipelineResult},
    geometry::MAX_UPSCALE_FACTOR,
    metadata::FieldIndex,
    tonemap::RenderConfig,
};

/// Words of one metadata line printed in the status text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusField {
    pub line: usize,
    pub offsets: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Words per row when splitting a flat metadata stream.
    pub row_width: usize,
    /// Words per line addressed by [`StatusField`]s.
    pub line_words: usize,
    /// Fields that change every frame (counters) and are not
    /// worth reporting.
    pub ignore: Vec<FieldIndex>,
    /// Change events kept for display.
    pub history_len: usize,
    pub status_fields: Vec<StatusField>,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        MetadataSettings {
            row_width: 24,
            line_words: 256,
            ignore: vec![(0, 0), (0, 1)],
            history_len: 3,
            status_fields: vec![
                StatusField {
                    line: 0,
                    offsets: vec![0, 1, 16],
                },
                StatusField {
                    line: 1,
                    offsets: vec![0, 1],
                },
            ],
        }
    }
}

impl MetadataSettings {
    pub fn ignore_set(&self) -> BTreeSet<FieldIndex> {
        self.ignore.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: CalibrationSettings,
    pub metadata: MetadataSettings,
    pub render: RenderConfig,
    pub clahe: ClaheSettings,
    /// Start capturing a baseline as soon as the pipeline is
    /// created, without triggering the shutter.
    pub calibrate_on_start: bool,
    /// Save the rendered frames of each calibration cycle here.
    pub autosave_dir: Option<PathBuf>,
    pub tick_period_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            calibration: CalibrationSettings::default(),
            metadata: MetadataSettings::default(),
            render: RenderConfig::default(),
            clahe: ClaheSettings::default(),
            calibrate_on_start: true,
            autosave_dir: None,
            tick_period_ms: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(PipelineError::InvalidConfig(msg.to_string()))
            }
        };
        check(
            (1..=MAX_UPSCALE_FACTOR).contains(&self.render.upscale_factor),
            &format!("render.upscale_factor must be between 1 and {}", MAX_UPSCALE_FACTOR),
        )?;
        check(self.metadata.row_width >= 1, "metadata.row_width must be at least 1")?;
        check(self.metadata.line_words >= 1, "metadata.line_words must be at least 1")?;
        check(self.metadata.history_len >= 1, "metadata.history_len must be at least 1")?;
        check(self.clahe.clip_limit > 0., "clahe.clip_limit must be positive")?;
        check(self.clahe.grid >= 1, "clahe.grid must be at least 1")?;
        Ok(())
    }
}
