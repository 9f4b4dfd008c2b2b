//! lift3d_io - image output for text-to-3D training.
//!
//! Turns [`ImagePanel`](lift3d_core::ImagePanel) descriptors into PNG grids
//! and directories of frames into GIF or MP4 videos.
//!
//! # Core Types
//!
//! - [`ImageSink`]: destination trait used by the training system
//! - [`DiskImageSink`]: writes everything below one directory
//! - [`SequenceRequest`]: what to assemble, from where, in which format
//!
//! # Example
//!
//! ```ignore
//! use lift3d_core::ImagePanel;
//! use lift3d_io::{DiskImageSink, ImageSink, SequenceRequest};
//!
//! let mut sink = DiskImageSink::new("outputs/run0");
//! let rgb = ImagePanel::rgb(64, 64, rgb_values);
//! let opacity = ImagePanel::grayscale(64, 64, opacity_values);
//! sink.save_image_grid("it0-test/0.png", &[rgb, opacity], "test_step", 0)?;
//!
//! sink.save_img_sequence(&SequenceRequest::new("it0-test", "it0-test"))?;
//! ```
//!
//! MP4 output requires an `ffmpeg` binary on `PATH`; GIF output does not.

#![warn(missing_docs)]

pub mod error;
pub mod grid;
pub mod sequence;
pub mod sink;

pub use error::{Lift3dIoError, Result};
pub use grid::{compose_grid, jet, panel_to_image};
pub use sequence::{
    assemble_sequence, collect_frames, load_frames, write_gif, write_mp4, SequenceRequest,
    VideoFormat,
};
pub use sink::{DiskImageSink, ImageSink};
