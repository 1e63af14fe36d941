//! The per-tick acquisition pipeline.
//!
//! Every tick reads one frame from the device and pushes it
//! through decoding, diffing, calibration and tone mapping
//! before handing image and status text to a
//! [`FrameDisplay`]. Ticks run one at a time; a tick that
//! cannot read a frame changes nothing and leaves the last
//! published image in place.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use image::RgbImage;
use itertools::Itertools;
use tracing::{debug, error, info, warn};

use crate::{
    calibration::{CalibrationEngine, CalibrationState},
    config::PipelineConfig,
    device::{DeviceInfo, ThermalDevice},
    diff::{diff, ChangeEvent, ChangeHistory},
    display::FrameDisplay,
    error::{PipelineError, PipelineResult},
    frame::CalibratedFrame,
    geometry::{Orientation, MAX_UPSCALE_FACTOR},
    metadata::{FieldIndex, MetadataSnapshot},
    persist::{self, calibration_file_name, rendered_file_name, snapshot_file_name},
    status::StatusReport,
    tonemap::{RenderConfig, ToneMapStrategy, ToneMapper},
};

/// Calibration triggers coming from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationRequest {
    /// Close the shutter and recalibrate right away.
    Shutter,
    /// Switch to the normal temperature range, recalibrate once
    /// the sensor settled.
    RangeNormal,
    /// Switch to the high temperature range, recalibrate once
    /// the sensor settled.
    RangeHigh,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// A frame was rendered and published. `errors` holds the
    /// recoverable errors met on the way.
    Rendered { errors: Vec<PipelineError> },
    /// No frame could be read; nothing changed.
    Skipped(PipelineError),
}

impl TickOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, TickOutcome::Rendered { .. })
    }

    pub fn errors(&self) -> &[PipelineError] {
        match self {
            TickOutcome::Rendered { errors } => errors,
            TickOutcome::Skipped(e) => std::slice::from_ref(e),
        }
    }
}

pub struct Pipeline<D> {
    device: D,
    config: PipelineConfig,
    engine: CalibrationEngine,
    mapper: ToneMapper,
    ignore: BTreeSet<FieldIndex>,
    previous: Option<MetadataSnapshot>,
    history: ChangeHistory,
    last_image: Option<RgbImage>,
    last_status: String,
}

impl<D: ThermalDevice> Pipeline<D> {
    pub fn new(device: D, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let engine = if config.calibrate_on_start {
            CalibrationEngine::capturing(config.calibration.clone())
        } else {
            CalibrationEngine::new(config.calibration.clone())
        };
        Ok(Pipeline {
            device,
            engine,
            mapper: ToneMapper::new(config.clahe.clone()),
            ignore: config.metadata.ignore_set(),
            previous: None,
            history: ChangeHistory::new(config.metadata.history_len),
            last_image: None,
            last_status: String::new(),
            config,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.config.render
    }

    pub fn calibration(&self) -> &CalibrationEngine {
        &self.engine
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.engine.state()
    }

    pub fn history(&self) -> impl Iterator<Item = &ChangeEvent> + '_ {
        self.history.events()
    }

    pub fn last_image(&self) -> Option<&RgbImage> {
        self.last_image.as_ref()
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    /// Run one full pass: acquire, decode, diff, calibrate,
    /// render, publish.
    pub fn tick<F: FrameDisplay + ?Sized>(&mut self, display: &mut F) -> TickOutcome {
        let capture = match self.device.read() {
            Ok(capture) => capture,
            Err(e) => {
                warn!("frame acquisition failed: {:#}", e);
                return TickOutcome::Skipped(PipelineError::AcquisitionFailure(e));
            }
        };
        let info = self.device.info().unwrap_or_else(|e| {
            warn!("device info unavailable: {:#}", e);
            DeviceInfo::default()
        });
        let mut errors = vec![];

        let snapshot = capture.metadata.decode(self.config.metadata.row_width);
        if let Some(previous) = &self.previous {
            if previous.shape() != snapshot.shape() {
                let e = PipelineError::MetadataShapeMismatch {
                    previous: previous.shape(),
                    current: snapshot.shape(),
                };
                warn!("{}", e);
                errors.push(e);
            }
        }
        let events = diff(self.previous.as_ref(), &snapshot, &self.ignore);
        for event in events.iter() {
            info!("{}", event);
        }
        self.history.extend(events);

        let frame = capture.frame;
        let raw_stats = frame.stats();
        let calibrated = match self.engine.process(&frame) {
            Ok(calibrated) => calibrated,
            Err(e) => {
                error!("calibration aborted: {}", e);
                self.engine.reset();
                errors.push(e.into());
                CalibratedFrame::from(&frame)
            }
        };
        let calibrated_stats = calibrated.stats();
        let image = self.mapper.render(&calibrated, &self.config.render, &info);

        if let Some(dir) = &self.config.autosave_dir {
            if let Some(index) = self.engine.calibration_frame_index() {
                let path = dir.join(calibration_file_name(&now(), index));
                if let Err(e) = persist::save_png(&path, &image) {
                    warn!("autosave failed: {:#}", e);
                }
            }
        }

        match self.engine.advance() {
            Ok(true) => self.command("calibrate", D::calibrate),
            Ok(false) => {}
            Err(e) => {
                error!("{}", e);
                errors.push(e.into());
            }
        }

        let report = StatusReport {
            calibration: self.engine.state(),
            calibrating: self.engine.calibration_frame_index().is_some(),
            raw_stats,
            calibrated_stats,
            metadata: snapshot.clone(),
            history: self.history.events().copied().collect(),
            info,
            error: (!errors.is_empty()).then(|| errors.iter().join("; ")),
        };
        let metadata = &self.config.metadata;
        let status = report.text(
            &metadata.status_fields,
            metadata.line_words,
            self.config.render.verbose,
        );
        if let Err(e) = display.show(&image, &status) {
            warn!("display failed: {:#}", e);
        }

        self.previous = Some(snapshot);
        self.last_image = Some(image);
        self.last_status = status;
        TickOutcome::Rendered { errors }
    }

    /// Forward a calibration trigger to the device and arm the
    /// engine with the settle delay of the requested mode.
    pub fn request_calibration(&mut self, request: CalibrationRequest) {
        let settings = self.engine.settings();
        let settle_ticks = match request {
            CalibrationRequest::Shutter => 0,
            CalibrationRequest::RangeNormal => settings.settle_ticks_normal,
            CalibrationRequest::RangeHigh => settings.settle_ticks_high,
        };
        match request {
            CalibrationRequest::Shutter => {}
            CalibrationRequest::RangeNormal => {
                self.command("temperature_range_normal", D::temperature_range_normal)
            }
            CalibrationRequest::RangeHigh => {
                self.command("temperature_range_high", D::temperature_range_high)
            }
        }
        if self.engine.start_recalibration(settle_ticks) {
            self.command("calibrate", D::calibrate);
        }
    }

    fn command(&mut self, name: &str, run: impl FnOnce(&mut D) -> Result<()>) {
        match run(&mut self.device) {
            Ok(()) => debug!(command = name, "device command sent"),
            Err(e) => warn!(command = name, "device command failed: {:#}", e),
        }
    }

    /// Turn the display a quarter turn clockwise.
    pub fn rotate_orientation(&mut self) {
        let render = &mut self.config.render;
        render.orientation = render.orientation.compose(Orientation::Deg270);
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.config.render.orientation = orientation;
    }

    pub fn toggle_overlay(&mut self) {
        let render = &mut self.config.render;
        render.draw_temperature_overlay = !render.draw_temperature_overlay;
    }

    /// Switch the diagnostic text on or off. The image is
    /// enlarged while the text is hidden.
    pub fn toggle_verbose(&mut self) {
        let render = &mut self.config.render;
        render.verbose = !render.verbose;
        render.upscale_factor = if render.verbose { 2 } else { 4 };
    }

    pub fn set_tone_map(&mut self, strategy: ToneMapStrategy) {
        self.config.render.tone_map = strategy;
    }

    pub fn set_luminance_contrast(&mut self, enabled: bool) {
        self.config.render.luminance_contrast_enhance = enabled;
    }

    pub fn set_upscale(&mut self, factor: u32) -> PipelineResult<()> {
        if !(1..=MAX_UPSCALE_FACTOR).contains(&factor) {
            return Err(PipelineError::InvalidConfig(format!(
                "upscale factor must be between 1 and {}, got {}",
                MAX_UPSCALE_FACTOR, factor
            )));
        }
        self.config.render.upscale_factor = factor;
        Ok(())
    }

    /// Read a fresh frame and store it in `dir` under a
    /// timestamped name.
    pub fn save_snapshot(&mut self, dir: &Path) -> Result<PathBuf> {
        let capture = self.device.read()?;
        let path = dir.join(snapshot_file_name(&now()));
        persist::save_snapshot(&path, &capture)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Store the last rendered image in `dir`.
    pub fn save_rendered(&self, dir: &Path) -> Result<PathBuf> {
        let image = self
            .last_image
            .as_ref()
            .ok_or_else(|| anyhow!("no frame rendered yet"))?;
        let path = dir.join(rendered_file_name(&now()));
        persist::save_png(&path, image)?;
        info!(path = %path.display(), "rendered frame saved");
        Ok(path)
    }

    /// Tick every `tick_period_ms` until `stop` is set or
    /// `max_ticks` ticks ran. `stop` is only looked at between
    /// ticks. Returns the number of ticks run.
    pub fn run<F: FrameDisplay + ?Sized>(
        &mut self,
        display: &mut F,
        stop: &AtomicBool,
        max_ticks: Option<u64>,
    ) -> u64 {
        let period = Duration::from_millis(self.config.tick_period_ms);
        let mut ticks = 0;
        while !stop.load(Ordering::SeqCst) && max_ticks.map_or(true, |max| ticks < max) {
            let outcome = self.tick(display);
            debug!(tick = ticks, rendered = outcome.is_rendered(), "tick done");
            ticks += 1;
            if period > Duration::from_millis(0) {
                thread::sleep(period);
            }
        }
        ticks
    }

    /// Hand the device back.
    pub fn release(mut self) -> Result<()> {
        self.device.release()
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
