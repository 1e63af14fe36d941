//! Where rendered frames go.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::persist::save_png;

/// Receives one rendered image and its status text per tick.
pub trait FrameDisplay {
    fn show(&mut self, image: &RgbImage, status: &str) -> Result<()>;
}

/// Keeps only the most recent frame.
#[derive(Debug, Default)]
pub struct LatestFrame {
    pub image: Option<RgbImage>,
    pub status: String,
    pub shown: usize,
}

impl FrameDisplay for LatestFrame {
    fn show(&mut self, image: &RgbImage, status: &str) -> Result<()> {
        self.image = Some(image.clone());
        self.status = status.to_string();
        self.shown += 1;
        Ok(())
    }
}

/// Writes every frame as `frame_NNNNNN.png` plus
/// `frame_NNNNNN.txt` with the status text.
#[derive(Debug)]
pub struct DirectoryDisplay {
    dir: PathBuf,
    count: usize,
}

impl DirectoryDisplay {
    pub fn create(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(DirectoryDisplay { dir, count: 0 })
    }
}

impl FrameDisplay for DirectoryDisplay {
    fn show(&mut self, image: &RgbImage, status: &str) -> Result<()> {
        let stem = format!("frame_{:06}", self.count);
        save_png(&self.dir.join(format!("{}.png", stem)), image)?;
        let text = self.dir.join(format!("{}.txt", stem));
        std::fs::write(&text, status).with_context(|| format!("writing {}", text.display()))?;
        self.count += 1;
        Ok(())
    }
}
