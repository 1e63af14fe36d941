use anyhow::{anyhow, Context, Result};
use clap::value_t_or_exit;
use std::{convert::TryFrom, path::PathBuf};
use thermal_pipeline::{
    arg, args_parser, geometry::Orientation, opt, tonemap::ToneMapStrategy, PipelineConfig,
};

pub struct Args {
    pub paths: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub looping: bool,
    pub ticks: Option<u64>,
    pub output: Option<PathBuf>,
    pub save_dir: PathBuf,
    pub keys: Vec<(u64, char)>,
    pub verbosity: u64,
    pub orientation: Option<Orientation>,
    pub upscale: Option<u32>,
    pub tone_map: Option<ToneMapStrategy>,
    pub overlay: bool,
    pub enhance: bool,
    pub quiet: bool,
    pub no_calibrate: bool,
    pub period: Option<u64>,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-view")
            .about("Replay recorded thermal frames through the live pipeline.")
            .arg(opt!("config").short("c").help("Pipeline configuration (json)"))
            .arg(
                opt!("loop")
                    .short("l")
                    .takes_value(false)
                    .help("Start over after the last frame"),
            )
            .arg(opt!("ticks").short("n").help("Number of ticks to run (default: one per frame)"))
            .arg(opt!("output").short("o").help("Write every rendered frame and its status here"))
            .arg(opt!("save dir").help("Directory for snapshots and saved frames (default: .)"))
            .arg(
                opt!("key")
                    .short("k")
                    .multiple(true)
                    .number_of_values(1)
                    .help("Press KEY before tick TICK, given as TICK:KEY (u, k, l, o, t, v, e, m, a, s)"),
            )
            .arg(
                opt!("verbose")
                    .short("v")
                    .multiple(true)
                    .takes_value(false)
                    .help("More logging (repeat for more)"),
            )
            .arg(opt!("orientation").help("Rotation in degrees: 0, 90, 180 or 270"))
            .arg(opt!("upscale").short("u").help("Upscale factor"))
            .arg(
                opt!("tone map")
                    .short("m")
                    .possible_values(&["stretch", "equalize"])
                    .help("Tone mapping strategy"),
            )
            .arg(
                opt!("overlay")
                    .short("t")
                    .takes_value(false)
                    .help("Draw min / max / centre temperatures"),
            )
            .arg(
                opt!("enhance")
                    .short("e")
                    .takes_value(false)
                    .help("Local contrast enhancement"),
            )
            .arg(
                opt!("quiet")
                    .short("q")
                    .takes_value(false)
                    .help("Short status text and larger image"),
            )
            .arg(
                opt!("no calibrate")
                    .takes_value(false)
                    .help("Don't capture a baseline at start-up"),
            )
            .arg(opt!("period").short("p").help("Tick period in milliseconds"))
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("Snapshot files or directories"),
            )
            .get_matches();

        let paths = matches
            .values_of("paths")
            .map(|v| v.map(PathBuf::from).collect())
            .unwrap_or_default();
        let keys = matches
            .values_of("key")
            .map(|v| v.map(parse_key).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        let orientation = matches
            .is_present("orientation")
            .then(|| value_t_or_exit!(matches.value_of("orientation"), u32))
            .map(|deg| Orientation::try_from(deg).map_err(|e| anyhow!(e)))
            .transpose()?;
        let tone_map = matches.value_of("tone map").map(|m| match m {
            "stretch" => ToneMapStrategy::MinMaxStretch,
            _ => ToneMapStrategy::HistogramEqualize,
        });

        Ok(Args {
            paths,
            config: matches.value_of("config").map(PathBuf::from),
            looping: matches.is_present("loop"),
            ticks: matches
                .is_present("ticks")
                .then(|| value_t_or_exit!(matches.value_of("ticks"), u64)),
            output: matches.value_of("output").map(PathBuf::from),
            save_dir: matches
                .value_of("save dir")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            keys,
            verbosity: matches.occurrences_of("verbose"),
            orientation,
            upscale: matches
                .is_present("upscale")
                .then(|| value_t_or_exit!(matches.value_of("upscale"), u32)),
            tone_map,
            overlay: matches.is_present("overlay"),
            enhance: matches.is_present("enhance"),
            quiet: matches.is_present("quiet"),
            no_calibrate: matches.is_present("no calibrate"),
            period: matches
                .is_present("period")
                .then(|| value_t_or_exit!(matches.value_of("period"), u64)),
        })
    }

    /// Command line flags take precedence over the config file.
    pub fn apply(&self, config: &mut PipelineConfig) {
        let render = &mut config.render;
        if let Some(orientation) = self.orientation {
            render.orientation = orientation;
        }
        if let Some(tone_map) = self.tone_map {
            render.tone_map = tone_map;
        }
        if self.quiet {
            render.verbose = false;
            render.upscale_factor = 4;
        }
        if let Some(upscale) = self.upscale {
            render.upscale_factor = upscale;
        }
        render.draw_temperature_overlay |= self.overlay;
        render.luminance_contrast_enhance |= self.enhance;
        if self.no_calibrate {
            config.calibrate_on_start = false;
        }
        if let Some(period) = self.period {
            config.tick_period_ms = period;
        }
    }
}

fn parse_key(raw: &str) -> Result<(u64, char)> {
    let (tick, key) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected TICK:KEY, got {:?}", raw))?;
    let tick = tick.parse::<u64>().with_context(|| format!("bad tick in {:?}", raw))?;
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok((tick, c)),
        _ => Err(anyhow!("expected a single key in {:?}", raw)),
    }
}
