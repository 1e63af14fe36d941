//! Live processing pipeline for USB thermal cameras.
//!
//! Each frame delivered by the camera goes through the same
//! steps, driven one tick at a time by [`Pipeline`]:
//!
//! 1. The metadata words that trail the pixels are
//! [decoded](metadata) into a row/column addressable
//! snapshot and [compared](diff) against the previous one.
//! Changed fields are logged and kept in a short history.
//!
//! 2. The [calibration engine](calibration) captures a
//! baseline frame a fixed number of frames after the shutter
//! closed, and subtracts it from every frame that follows.
//!
//! 3. The [tone mapper](tonemap) turns the calibrated frame
//! into a coloured image: normalisation, palette lookup,
//! optional local contrast enhancement, rotation, upscaling
//! and temperature markers.
//!
//! 4. Image and [status text](status) are handed to a
//! [`FrameDisplay`](display::FrameDisplay).
//!
//! # Usage
//!
//! The camera is reached through the [`ThermalDevice`] trait.
//! [`ReplayDevice`] plays back recorded
//! [snapshots](persist):
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use thermal_pipeline::{display::LatestFrame, Pipeline, PipelineConfig, ReplayDevice};
//!
//! let device = ReplayDevice::from_paths(&["2024-03-09_07-05-42.raw"], false)?;
//! let mut pipeline = Pipeline::new(device, PipelineConfig::default())?;
//! let mut display = LatestFrame::default();
//! pipeline.tick(&mut display);
//! println!("{}", display.status);
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod config;
pub mod contrast;
pub mod device;
pub mod diff;
pub mod display;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod metadata;
pub mod overlay;
pub mod palette;
pub mod persist;
pub mod pipeline;
pub mod status;
pub mod tonemap;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::config::PipelineConfig;
pub use crate::device::{ReplayDevice, ThermalDevice};
pub use crate::pipeline::{CalibrationRequest, Pipeline, TickOutcome};
