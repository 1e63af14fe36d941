use anyhow::{anyhow, Result};
use clap::value_t_or_exit;
use std::{convert::TryFrom, path::PathBuf};
use thermal_pipeline::{
    arg, args_parser, geometry::Orientation, opt, tonemap::ToneMapStrategy, PipelineConfig,
};

pub struct Args {
    pub paths: Vec<PathBuf>,
    pub output: PathBuf,
    pub baseline: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub verbosity: u64,
    pub orientation: Option<Orientation>,
    pub upscale: Option<u32>,
    pub tone_map: Option<ToneMapStrategy>,
    pub overlay: bool,
    pub enhance: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-render")
            .about("Render recorded thermal frames to png.")
            .arg(
                opt!("output")
                    .short("o")
                    .required(true)
                    .help("Output directory"),
            )
            .arg(
                opt!("baseline")
                    .short("b")
                    .help("Snapshot to subtract from every frame"),
            )
            .arg(opt!("config").short("c").help("Pipeline configuration (json)"))
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
        let output = value_t_or_exit!(matches, "output", PathBuf);
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
            output,
            baseline: matches.value_of("baseline").map(PathBuf::from),
            config: matches.value_of("config").map(PathBuf::from),
            verbosity: matches.occurrences_of("verbose"),
            orientation,
            upscale: matches
                .is_present("upscale")
                .then(|| value_t_or_exit!(matches.value_of("upscale"), u32)),
            tone_map,
            overlay: matches.is_present("overlay"),
            enhance: matches.is_present("enhance"),
        })
    }

    pub fn apply(&self, config: &mut PipelineConfig) {
        let render = &mut config.render;
        if let Some(orientation) = self.orientation {
            render.orientation = orientation;
        }
        if let Some(tone_map) = self.tone_map {
            render.tone_map = tone_map;
        }
        if let Some(upscale) = self.upscale {
            render.upscale_factor = upscale;
        }
        render.draw_temperature_overlay |= self.overlay;
        render.luminance_contrast_enhance |= self.enhance;
    }
}
