//! Baseline capture and subtraction.
//!
//! The engine walks through
//!
//! ```text
//! Idle --start--> Arming(n) --n ticks--> Capturing(0) --warm-up--> Active
//!                                             |
//!                                             +--timeout--> Idle
//! ```
//!
//! While `Capturing`, the frame at index `warmup_frames` is
//! taken as the baseline (the earlier frames are unstable
//! while the shutter settles). From then on every frame has the
//! baseline subtracted from it.

use ndarray::Array2;
use serde_derive::*;
use tracing::{debug, info};

use crate::{
    error::CalibrationError,
    frame::{CalibratedFrame, RawFrame},
};

/// Sensor-specific calibration constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Capturing frame index that becomes the baseline.
    pub warmup_frames: u32,
    /// Capturing gives up once the frame index passes this.
    pub timeout_frames: u32,
    /// Ticks to wait after switching to the normal range.
    pub settle_ticks_normal: u32,
    /// Ticks to wait after switching to the high range.
    pub settle_ticks_high: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        CalibrationSettings {
            warmup_frames: 15,
            timeout_frames: 30,
            settle_ticks_normal: 100,
            settle_ticks_high: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Arming { countdown: u32 },
    Capturing { frame_index: u32 },
    /// `frame_index` keeps counting for diagnostics only.
    Active { frame_index: u32 },
}

impl Default for CalibrationState {
    fn default() -> Self {
        CalibrationState::Idle
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    settings: CalibrationSettings,
    state: CalibrationState,
    baseline: Option<Array2<f32>>,
}

impl CalibrationEngine {
    pub fn new(settings: CalibrationSettings) -> Self {
        CalibrationEngine {
            settings,
            state: CalibrationState::Idle,
            baseline: None,
        }
    }

    /// Start directly in `Capturing(0)` without triggering the
    /// device, as happens when the camera is opened.
    pub fn capturing(settings: CalibrationSettings) -> Self {
        CalibrationEngine {
            state: CalibrationState::Capturing { frame_index: 0 },
            ..Self::new(settings)
        }
    }

    /// An `Active` engine with a known baseline.
    pub fn with_baseline(settings: CalibrationSettings, baseline: &RawFrame) -> Self {
        CalibrationEngine {
            state: CalibrationState::Active {
                frame_index: settings.warmup_frames,
            },
            baseline: Some(baseline.to_float()),
            settings,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    pub fn baseline(&self) -> Option<&Array2<f32>> {
        self.baseline.as_ref()
    }

    /// Index of the current frame within a calibration cycle,
    /// as long as it lies within `0..=timeout_frames`.
    pub fn calibration_frame_index(&self) -> Option<u32> {
        match self.state {
            CalibrationState::Capturing { frame_index } | CalibrationState::Active { frame_index }
                if frame_index <= self.settings.timeout_frames =>
            {
                Some(frame_index)
            }
            _ => None,
        }
    }

    /// Drop the baseline and arm a new cycle that triggers after
    /// `settle_ticks` completed ticks.
    ///
    /// Returns `true` when the device calibration must be
    /// triggered right away (no settle delay); the engine is
    /// then already `Capturing`.
    #[must_use]
    pub fn start_recalibration(&mut self, settle_ticks: u32) -> bool {
        self.baseline = None;
        if settle_ticks == 0 {
            info!("calibration triggered");
            self.state = CalibrationState::Capturing { frame_index: 0 };
            true
        } else {
            info!(settle_ticks, "calibration armed");
            self.state = CalibrationState::Arming {
                countdown: settle_ticks,
            };
            false
        }
    }

    /// Back to `Idle` without a baseline.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.state = CalibrationState::Idle;
    }

    /// Take `frame` as the baseline if this is the capture
    /// frame of the cycle. Returns whether a capture happened.
    pub fn capture_if_due(&mut self, frame: &RawFrame) -> bool {
        match self.state {
            CalibrationState::Capturing { frame_index }
                if frame_index == self.settings.warmup_frames =>
            {
                info!(frame_index, "captured calibration baseline");
                self.baseline = Some(frame.to_float());
                self.state = CalibrationState::Active { frame_index };
                true
            }
            _ => false,
        }
    }

    /// `frame - baseline`, or the frame itself when there is no
    /// baseline. Neither the frame nor the baseline is touched.
    pub fn subtract(&self, frame: &RawFrame) -> Result<CalibratedFrame, CalibrationError> {
        let mut values = frame.to_float();
        if let Some(baseline) = &self.baseline {
            if baseline.dim() != values.dim() {
                return Err(CalibrationError::DimensionMismatch {
                    expected: baseline.dim(),
                    actual: values.dim(),
                });
            }
            values -= baseline;
        }
        Ok(CalibratedFrame::new(values))
    }

    /// [`capture_if_due`](Self::capture_if_due) followed by
    /// [`subtract`](Self::subtract).
    pub fn process(&mut self, frame: &RawFrame) -> Result<CalibratedFrame, CalibrationError> {
        self.capture_if_due(frame);
        self.subtract(frame)
    }

    /// Advance the per-tick counters once a tick has completed.
    ///
    /// Returns `Ok(true)` when an arming countdown ran out and
    /// the device calibration must be triggered now. A capture
    /// phase that runs past `timeout_frames` resets the engine
    /// to `Idle` and reports a timeout.
    pub fn advance(&mut self) -> Result<bool, CalibrationError> {
        match self.state {
            CalibrationState::Idle => Ok(false),
            CalibrationState::Arming { countdown } => {
                let countdown = countdown.saturating_sub(1);
                if countdown == 0 {
                    info!("settle delay over, calibration triggered");
                    self.state = CalibrationState::Capturing { frame_index: 0 };
                    Ok(true)
                } else {
                    self.state = CalibrationState::Arming { countdown };
                    Ok(false)
                }
            }
            CalibrationState::Capturing { frame_index } => {
                let frame_index = frame_index + 1;
                if frame_index > self.settings.timeout_frames {
                    self.state = CalibrationState::Idle;
                    Err(CalibrationError::CalibrationTimeout {
                        frame_index,
                        bound: self.settings.timeout_frames,
                    })
                } else {
                    debug!(frame_index, "calibration warm-up");
                    self.state = CalibrationState::Capturing { frame_index };
                    Ok(false)
                }
            }
            CalibrationState::Active { frame_index } => {
                self.state = CalibrationState::Active {
                    frame_index: frame_index.saturating_add(1),
                };
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn gradient(offset: u16) -> Result<RawFrame> {
        RawFrame::from_shape_vec(2, 3, (0..6).map(|v| v * 10 + offset).collect())
    }

    #[test]
    fn idle_passes_frames_through() -> Result<()> {
        let engine = CalibrationEngine::new(Default::default());
        let frame = gradient(7)?;
        let out = engine.subtract(&frame)?;
        assert_eq!(out.values(), &frame.to_float());
        Ok(())
    }

    #[test]
    fn active_subtracts_baseline_exactly() -> Result<()> {
        let baseline = gradient(3)?;
        let engine = CalibrationEngine::with_baseline(Default::default(), &baseline);
        let frame = RawFrame::from_shape_vec(2, 3, vec![0, 1, 65535, 40, 41, 42])?;
        let out = engine.subtract(&frame)?;
        let expected = frame.to_float() - baseline.to_float();
        assert_eq!(out.values(), &expected);
        assert_eq!(out.values()[(0, 0)], -3.);
        // inputs untouched
        assert_eq!(engine.baseline(), Some(&baseline.to_float()));
        assert_eq!(frame.pixels()[(0, 2)], 65535);
        Ok(())
    }

    #[test]
    fn captures_the_warmup_frame() -> Result<()> {
        let mut engine = CalibrationEngine::new(Default::default());
        assert!(!engine.start_recalibration(3));
        assert!(!engine.advance()?);
        assert!(!engine.advance()?);
        assert!(engine.advance()?);
        assert_eq!(engine.state(), CalibrationState::Capturing { frame_index: 0 });

        for tick in 0..15u16 {
            engine.process(&gradient(tick)?)?;
            assert!(engine.baseline().is_none());
            engine.advance()?;
        }
        // frame index 15 is the baseline
        let out = engine.process(&gradient(15)?)?;
        assert_eq!(engine.baseline(), Some(&gradient(15)?.to_float()));
        assert!(out.values().iter().all(|&v| v == 0.));
        assert_eq!(engine.state(), CalibrationState::Active { frame_index: 15 });

        engine.advance()?;
        assert_eq!(engine.state(), CalibrationState::Active { frame_index: 16 });
        let out = engine.process(&gradient(16)?)?;
        assert!(out.values().iter().all(|&v| v == 1.));
        Ok(())
    }

    #[test]
    fn capturing_times_out() -> Result<()> {
        let settings = CalibrationSettings {
            warmup_frames: 40,
            ..Default::default()
        };
        let mut engine = CalibrationEngine::capturing(settings);
        let frame = gradient(0)?;
        for _ in 0..30 {
            engine.process(&frame)?;
            engine.advance()?;
        }
        engine.process(&frame)?;
        let err = engine.advance().unwrap_err();
        assert_eq!(
            err,
            CalibrationError::CalibrationTimeout {
                frame_index: 31,
                bound: 30
            }
        );
        assert_eq!(engine.state(), CalibrationState::Idle);
        assert!(engine.baseline().is_none());
        Ok(())
    }

    #[test]
    fn recalibration_discards_baseline() -> Result<()> {
        let mut engine = CalibrationEngine::with_baseline(Default::default(), &gradient(1)?);
        assert!(engine.baseline().is_some());
        assert!(!engine.start_recalibration(100));
        assert!(engine.baseline().is_none());
        assert_eq!(engine.state(), CalibrationState::Arming { countdown: 100 });

        assert!(engine.start_recalibration(0));
        assert_eq!(engine.state(), CalibrationState::Capturing { frame_index: 0 });
        Ok(())
    }

    #[test]
    fn mismatched_baseline_is_rejected() -> Result<()> {
        let engine = CalibrationEngine::with_baseline(Default::default(), &gradient(1)?);
        let err = engine.subtract(&RawFrame::filled(3, 2, 0)).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::DimensionMismatch {
                expected: (2, 3),
                actual: (3, 2)
            }
        );
        Ok(())
    }

    #[test]
    fn frame_index_window() -> Result<()> {
        let mut engine = CalibrationEngine::capturing(Default::default());
        assert_eq!(engine.calibration_frame_index(), Some(0));
        let frame = gradient(0)?;
        for _ in 0..31 {
            engine.process(&frame)?;
            engine.advance()?;
        }
        assert!(matches!(engine.state(), CalibrationState::Active { frame_index: 31 }));
        assert_eq!(engine.calibration_frame_index(), None);
        Ok(())
    }
}
