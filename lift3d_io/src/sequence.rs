//! Frame-sequence assembly into GIF or MP4.
//!
//! Frames are collected from a directory by matching file names against a
//! regex whose first capture group is the frame number. Frames are ordered
//! numerically, so `10.png` sorts after `9.png`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbImage};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Lift3dIoError, Result};

/// Output container for an assembled sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// H.264 MP4 through an external `ffmpeg`.
    #[default]
    Mp4,
    /// Animated GIF.
    Gif,
}

impl VideoFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Gif => "gif",
        }
    }
}

/// A request to turn a directory of frames into one video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRequest {
    /// Output file stem, relative to the sink's save directory.
    pub filename: String,
    /// Frame directory, relative to the sink's save directory.
    pub img_dir: String,
    /// Regex matched against frame file names; group 1 is the frame number.
    pub pattern: String,
    /// Output container.
    pub save_format: VideoFormat,
    /// Frames per second.
    pub fps: u32,
    /// Tag for logging.
    pub name: String,
    /// Training step the sequence belongs to.
    pub step: u64,
}

impl SequenceRequest {
    /// Create a request with the default frame pattern, MP4 output at 30 fps.
    pub fn new(filename: impl Into<String>, img_dir: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            img_dir: img_dir.into(),
            pattern: r"(\d+)\.png".to_string(),
            save_format: VideoFormat::Mp4,
            fps: 30,
            name: String::new(),
            step: 0,
        }
    }

    /// Set the frame pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the output container.
    pub fn with_format(mut self, save_format: VideoFormat) -> Self {
        self.save_format = save_format;
        self
    }

    /// Set the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the logging tag and step.
    pub fn with_tag(mut self, name: impl Into<String>, step: u64) -> Self {
        self.name = name.into();
        self.step = step;
        self
    }

    /// Output file name with extension.
    pub fn output_name(&self) -> String {
        format!("{}.{}", self.filename, self.save_format.extension())
    }
}

/// Collect frame paths in `dir` matching `pattern`, in numeric order.
///
/// The whole file name must match. Files whose capture does not parse as an
/// integer are skipped.
pub fn collect_frames(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let anchored = format!("^(?:{})$", pattern);
    let re = Regex::new(&anchored).map_err(|e| Lift3dIoError::InvalidPattern {
        message: e.to_string(),
    })?;
    if re.captures_len() < 2 {
        return Err(Lift3dIoError::InvalidPattern {
            message: format!("'{}' has no capture group", pattern),
        });
    }

    let mut frames: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = re.captures(name) else {
            continue;
        };
        let Some(index) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
            continue;
        };
        frames.push((index, entry.path()));
    }

    if frames.is_empty() {
        return Err(Lift3dIoError::EmptySequence {
            dir: dir.display().to_string(),
        });
    }

    frames.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Load frames as RGB images.
pub fn load_frames(paths: &[PathBuf]) -> Result<Vec<RgbImage>> {
    paths
        .iter()
        .map(|p| Ok(image::open(p)?.to_rgb8()))
        .collect()
}

/// Encode frames into an infinitely looping GIF.
pub fn write_gif(frames: &[RgbImage], fps: u32, out: &Path) -> Result<()> {
    if frames.is_empty() {
        return Err(Lift3dIoError::EmptySequence {
            dir: out.display().to_string(),
        });
    }
    let fps = fps.max(1);

    let file = BufWriter::new(File::create(out)?);
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite)?;
    for frame in frames {
        let rgba = image::DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
        let delay = Delay::from_numer_denom_ms(1000, fps);
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
    }
    Ok(())
}

/// Encode frames into an H.264 MP4 by piping raw RGB into `ffmpeg`.
///
/// All frames must share the first frame's dimensions.
pub fn write_mp4(frames: &[RgbImage], fps: u32, out: &Path) -> Result<()> {
    let first = frames.first().ok_or_else(|| Lift3dIoError::EmptySequence {
        dir: out.display().to_string(),
    })?;
    let (width, height) = first.dimensions();
    if let Some(bad) = frames.iter().find(|f| f.dimensions() != (width, height)) {
        return Err(Lift3dIoError::Encoder {
            message: format!(
                "frame size {:?} does not match first frame {:?}",
                bad.dimensions(),
                (width, height)
            ),
        });
    }

    let mut command = Command::new("ffmpeg");
    command
        .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", &format!("{}x{}", width, height)])
        .args(["-framerate", &fps.max(1).to_string()])
        .args(["-i", "-"])
        // libx264 needs even dimensions
        .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
        .arg(out);
    pipe_frames(command, frames)
}

/// Run `command` with the raw RGB bytes of `frames` on its stdin.
///
/// stderr is drained on a separate thread while frames are written. The
/// child is killed if it stops reading, and is always waited on.
fn pipe_frames(mut command: Command, frames: &[RgbImage]) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Lift3dIoError::Encoder {
            message: format!("failed to start {}: {}", program, e),
        })?;

    let stderr = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut text = String::new();
            // A read error only loses diagnostics.
            let _ = pipe.read_to_string(&mut text);
            text
        })
    });

    // Dropping stdin at the end of the match closes it, so the encoder sees EOF.
    let written = match child.stdin.take() {
        Some(mut stdin) => frames.iter().try_for_each(|frame| stdin.write_all(frame.as_raw())),
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin unavailable")),
    };
    if written.is_err() {
        // The child may already have exited; kill is then a no-op.
        let _ = child.kill();
    }
    let status = child.wait()?;
    let stderr = stderr
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if let Err(e) = written {
        log::warn!("{} stopped reading frames: {}", program, e);
        return Err(Lift3dIoError::Encoder {
            message: format!("{} stopped reading frames ({}): {}", program, e, stderr.trim()),
        });
    }
    if !status.success() {
        return Err(Lift3dIoError::Encoder {
            message: format!("{} exited with {}: {}", program, status, stderr.trim()),
        });
    }
    Ok(())
}

/// Assemble the frames in `img_dir` into `out` using `format`.
pub fn assemble_sequence(
    img_dir: &Path,
    pattern: &str,
    format: VideoFormat,
    fps: u32,
    out: &Path,
) -> Result<usize> {
    let paths = collect_frames(img_dir, pattern)?;
    let frames = load_frames(&paths)?;
    match format {
        VideoFormat::Gif => write_gif(&frames, fps, out)?,
        VideoFormat::Mp4 => write_mp4(&frames, fps, out)?,
    }
    Ok(frames.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn test_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.png", "2.png", "1.png", "notes.txt", "a.png"] {
            touch(dir.path(), name);
        }
        let frames = collect_frames(dir.path(), r"(\d+)\.png").unwrap();
        let names: Vec<String> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.png", "2.png", "10.png"]);
    }

    #[test]
    fn test_full_name_must_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "3.png.bak");
        touch(dir.path(), "4.png");
        let frames = collect_frames(dir.path(), r"(\d+)\.png").unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            collect_frames(dir.path(), r"(\d+)\.png"),
            Err(Lift3dIoError::EmptySequence { .. })
        ));
    }

    #[test]
    fn test_pattern_needs_group() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            collect_frames(dir.path(), r"\d+\.png"),
            Err(Lift3dIoError::InvalidPattern { .. })
        ));
        assert!(matches!(
            collect_frames(dir.path(), r"(\d+"),
            Err(Lift3dIoError::InvalidPattern { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_receives_all_frames() {
        let frames = vec![RgbImage::new(64, 64); 3];
        assert!(pipe_frames(Command::new("cat"), &frames).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_exiting_early_is_an_error() {
        // Larger than a pipe buffer, so writing fails once the child is gone.
        let frames = vec![RgbImage::new(512, 512); 4];
        let result = pipe_frames(Command::new("true"), &frames);
        match result {
            Err(Lift3dIoError::Encoder { message }) => {
                assert!(message.contains("stopped reading"), "{}", message)
            }
            other => panic!("expected encoder error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_failure_reports_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "cat > /dev/null; echo bad codec >&2; exit 3"]);
        let frames = vec![RgbImage::new(8, 8); 2];
        match pipe_frames(command, &frames) {
            Err(Lift3dIoError::Encoder { message }) => {
                assert!(message.contains("bad codec"), "{}", message)
            }
            other => panic!("expected encoder error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_encoder() {
        let frames = vec![RgbImage::new(8, 8)];
        let result = pipe_frames(Command::new("lift3d-no-such-encoder"), &frames);
        assert!(matches!(result, Err(Lift3dIoError::Encoder { .. })));
    }

    #[test]
    fn test_request_defaults() {
        let req = SequenceRequest::new("it5-test", "it5-test").with_tag("test", 5);
        assert_eq!(req.pattern, r"(\d+)\.png");
        assert_eq!(req.fps, 30);
        assert_eq!(req.output_name(), "it5-test.mp4");
        assert_eq!(req.with_format(VideoFormat::Gif).output_name(), "it5-test.gif");
    }
}
