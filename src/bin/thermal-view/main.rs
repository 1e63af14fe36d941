mod args;

use std::{path::Path, sync::atomic::AtomicBool};

use anyhow::{ensure, Result};
use args::Args;
use tracing::{info, warn};

use thermal_pipeline::{
    cli::{collect_snapshot_paths, init_logging, load_config},
    display::{DirectoryDisplay, FrameDisplay, LatestFrame},
    tonemap::ToneMapStrategy,
    CalibrationRequest, Pipeline, ReplayDevice, ThermalDevice,
};

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    init_logging(args.verbosity)?;

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let paths = collect_snapshot_paths(args.paths.clone())?;
    ensure!(!paths.is_empty(), "no snapshot files found");
    let device = ReplayDevice::from_paths(&paths, args.looping)?;
    let max_ticks = args
        .ticks
        .or_else(|| (!args.looping).then(|| device.len() as u64));
    info!(frames = device.len(), "replaying");

    let mut display: Box<dyn FrameDisplay> = match &args.output {
        Some(dir) => Box::new(DirectoryDisplay::create(dir.clone())?),
        None => Box::new(LatestFrame::default()),
    };
    let mut pipeline = Pipeline::new(device, config)?;
    let stop = AtomicBool::new(false);

    let mut tick = 0;
    while max_ticks.map_or(true, |max| tick < max) {
        let keys = args.keys.iter().filter(|(at, _)| *at == tick).map(|&(_, key)| key);
        press_all(&mut pipeline, keys, &args.save_dir);
        pipeline.run(display.as_mut(), &stop, Some(1));
        tick += 1;
    }

    print!("{}", pipeline.last_status());
    pipeline.release()?;
    Ok(())
}

/// Press `keys` in order. A failing key action is logged and
/// does not stop the viewer. Returns the number of failures.
fn press_all<D: ThermalDevice>(
    pipeline: &mut Pipeline<D>,
    keys: impl IntoIterator<Item = char>,
    save_dir: &Path,
) -> usize {
    keys.into_iter()
        .filter(|&key| match press(pipeline, key, save_dir) {
            Ok(()) => false,
            Err(e) => {
                warn!(%key, "key action failed: {:#}", e);
                true
            }
        })
        .count()
}

/// The keyboard controls of the live viewer.
fn press<D: ThermalDevice>(pipeline: &mut Pipeline<D>, key: char, save_dir: &Path) -> Result<()> {
    info!(%key, "key pressed");
    match key {
        'u' => pipeline.request_calibration(CalibrationRequest::Shutter),
        'k' => pipeline.request_calibration(CalibrationRequest::RangeNormal),
        'l' => pipeline.request_calibration(CalibrationRequest::RangeHigh),
        'o' => pipeline.rotate_orientation(),
        't' => pipeline.toggle_overlay(),
        'v' => pipeline.toggle_verbose(),
        'e' => {
            let enabled = pipeline.render_config().luminance_contrast_enhance;
            pipeline.set_luminance_contrast(!enabled);
        }
        'm' => {
            let next = match pipeline.render_config().tone_map {
                ToneMapStrategy::MinMaxStretch => ToneMapStrategy::HistogramEqualize,
                ToneMapStrategy::HistogramEqualize => ToneMapStrategy::MinMaxStretch,
            };
            pipeline.set_tone_map(next);
        }
        'a' => {
            pipeline.save_snapshot(save_dir)?;
        }
        's' | 'w' => {
            pipeline.save_rendered(save_dir)?;
        }
        _ => warn!(%key, "unknown key"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermal_pipeline::{
        device::RawCapture, frame::RawFrame, metadata::MetadataWords, PipelineConfig,
    };

    fn replay(frames: usize) -> Pipeline<ReplayDevice> {
        let captures = (0..frames)
            .map(|_| RawCapture {
                frame: RawFrame::filled(2, 2, 7),
                metadata: MetadataWords::default(),
            })
            .collect();
        let mut config = PipelineConfig::default();
        config.calibrate_on_start = false;
        config.tick_period_ms = 0;
        Pipeline::new(ReplayDevice::new(captures, false), config).unwrap()
    }

    #[test]
    fn failing_keys_do_not_stop_the_viewer() {
        let dir = std::env::temp_dir().join(format!("thermal-view-keys-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut pipeline = replay(1);
        let mut display = LatestFrame::default();

        // nothing rendered yet
        assert_eq!(press_all(&mut pipeline, vec!['s', 't'], &dir), 1);
        assert!(pipeline.render_config().draw_temperature_overlay);

        pipeline.tick(&mut display);
        // replay exhausted, snapshot fails; saving the image works
        assert_eq!(press_all(&mut pipeline, vec!['a', 's', 'q'], &dir), 1);
        assert_eq!(pipeline.tick(&mut display).errors().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
