//! Error taxonomy of the acquisition pipeline.
//!
//! Every variant here is recoverable at the tick level: the
//! pipeline reports it in the status text and carries on with
//! the next tick. Collaborator failures (device, display,
//! files) are plain [`anyhow::Error`]s and get wrapped into
//! [`PipelineError::AcquisitionFailure`] where they cut a
//! tick short.

use thiserror::Error;

/// Errors raised by the [`CalibrationEngine`][crate::calibration::CalibrationEngine].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    /// Baseline and incoming frame disagree in shape. The
    /// calibration cycle is aborted and the engine must be
    /// reset.
    #[error("baseline is {expected:?} (height, width) but frame is {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The capturing phase ran past its frame bound without
    /// capturing a baseline.
    #[error("calibration did not capture a baseline within {bound} frames (at frame {frame_index})")]
    CalibrationTimeout { frame_index: u32, bound: u32 },
}

/// Errors surfaced by a single pipeline tick.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The device could not deliver a frame; the tick is
    /// skipped without touching any state.
    #[error("frame acquisition failed: {0:#}")]
    AcquisitionFailure(anyhow::Error),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Consecutive metadata snapshots have different
    /// layouts. Only the overlapping fields are diffed.
    #[error("metadata layout changed from {previous:?} to {current:?} words per row")]
    MetadataShapeMismatch {
        previous: Vec<usize>,
        current: Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
