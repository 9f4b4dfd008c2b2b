//! Image sinks: where saved grids and sequences go.

use std::fs;
use std::path::{Path, PathBuf};

use lift3d_core::ImagePanel;

use crate::error::Result;
use crate::grid::compose_grid;
use crate::sequence::{assemble_sequence, SequenceRequest};

/// Destination for image grids and assembled videos.
pub trait ImageSink {
    /// Compose `panels` left to right and save them under `filename`.
    ///
    /// `filename` may contain `/` to place the image in a subdirectory.
    /// Returns the path written.
    fn save_image_grid(
        &mut self,
        filename: &str,
        panels: &[ImagePanel],
        name: &str,
        step: u64,
    ) -> Result<PathBuf>;

    /// Assemble a directory of frames into one video.
    fn save_img_sequence(&mut self, request: &SequenceRequest) -> Result<PathBuf>;
}

/// Writes PNG grids and videos below a fixed directory.
#[derive(Debug, Clone)]
pub struct DiskImageSink {
    save_dir: PathBuf,
}

impl DiskImageSink {
    /// Create a sink rooted at `save_dir`. The directory is created lazily.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// Root output directory.
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Resolve a relative name against the save directory.
    pub fn save_path(&self, filename: &str) -> PathBuf {
        self.save_dir.join(filename)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl ImageSink for DiskImageSink {
    fn save_image_grid(
        &mut self,
        filename: &str,
        panels: &[ImagePanel],
        name: &str,
        step: u64,
    ) -> Result<PathBuf> {
        let path = self.save_path(filename);
        ensure_parent(&path)?;

        let grid = compose_grid(panels)?;
        grid.save(&path)?;

        log::debug!(
            "[{}] step {}: saved {}x{} grid to {}",
            name,
            step,
            grid.width(),
            grid.height(),
            path.display()
        );
        Ok(path)
    }

    fn save_img_sequence(&mut self, request: &SequenceRequest) -> Result<PathBuf> {
        let img_dir = self.save_path(&request.img_dir);
        let out = self.save_path(&request.output_name());
        ensure_parent(&out)?;

        let count = assemble_sequence(
            &img_dir,
            &request.pattern,
            request.save_format,
            request.fps,
            &out,
        )?;

        log::info!(
            "[{}] step {}: assembled {} frames into {}",
            request.name,
            request.step,
            count,
            out.display()
        );
        Ok(out)
    }
}
