//! Camera data for training and evaluation.

mod camera;

pub use camera::{orbit_cameras, CameraBatch, CameraSampler};
