//! Helpers to parse CLI arguments in the accompanying
//! binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
pub use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing_subscriber::EnvFilter;

use crate::{
    config::PipelineConfig,
    device::RawCapture,
    persist::{load_snapshot, snapshot_files_in},
};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr. `RUST_LOG` wins over `verbosity` (number
/// of `-v` flags).
pub fn init_logging(verbosity: u64) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing logger: {}", e))
}

/// Defaults, or the JSON file at `path`.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_path(path),
        None => Ok(PipelineConfig::default()),
    }
}

/// Expand directories into the snapshot files they contain.
/// Plain files are taken as given.
pub fn collect_snapshot_paths(inputs: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for input in inputs {
        if input.is_dir() {
            paths.extend(snapshot_files_in(&input)?);
        } else {
            paths.push(input);
        }
    }
    Ok(paths)
}

pub struct SnapshotInput {
    pub path: PathBuf,
    pub capture: RawCapture,
}

/// Load snapshots in parallel with a progress bar.
pub fn load_snapshots_par(
    paths: Vec<PathBuf>,
) -> impl ParallelIterator<Item = Result<SnapshotInput>> {
    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );

    paths
        .into_par_iter()
        .map(|path| -> Result<_> {
            let capture = load_snapshot(&path)?;
            Ok(SnapshotInput { path, capture })
        })
        .inspect(move |_| bar.inc(1))
}
