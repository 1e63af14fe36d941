mod args;

use anyhow::{Context, Result};
use args::Args;
use rayon::iter::ParallelIterator;
use tracing::debug;

use thermal_pipeline::{
    calibration::CalibrationEngine,
    cli::{collect_snapshot_paths, init_logging, load_config, load_snapshots_par, SnapshotInput},
    device::frame_info,
    persist::{load_snapshot, save_png},
    tonemap::ToneMapper,
};

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    init_logging(args.verbosity)?;

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let engine = match &args.baseline {
        Some(path) => {
            let baseline = load_snapshot(path)?;
            CalibrationEngine::with_baseline(config.calibration.clone(), &baseline.frame)
        }
        None => CalibrationEngine::new(config.calibration.clone()),
    };
    let mapper = ToneMapper::new(config.clahe.clone());
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let paths = collect_snapshot_paths(args.paths.clone())?;
    let count = load_snapshots_par(paths)
        .map(|input| -> Result<()> {
            let SnapshotInput { path, capture } = input?;
            let calibrated = engine
                .subtract(&capture.frame)
                .with_context(|| format!("calibrating {}", path.display()))?;
            let info = frame_info(&capture.frame, 0)?;
            let image = mapper.render(&calibrated, &config.render, &info);

            let stem = path.file_stem().unwrap_or_default();
            let out_path = args.output.join(stem).with_extension("png");
            save_png(&out_path, &image)?;
            debug!(from = %path.display(), to = %out_path.display(), "rendered");
            Ok(())
        })
        .try_fold(
            || 0usize,
            |acc, res| -> Result<_> {
                res?;
                Ok(acc + 1)
            },
        )
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    eprintln!("Rendered {} frames to {}", count, args.output.display());
    Ok(())
}
