//! # lift3d_core
//!
//! Pure host-side math for lifting 2D diffusion priors into 3D.
//!
//! This crate holds the parts of a text-to-3D training system that need no
//! tensor backend: camera poses and rays, step-dependent weight schedules,
//! diffusion noise schedules, deterministic hashing and image panel
//! descriptors. The `dreamfusion` crate builds on it for training, and
//! `lift3d_io` uses its panels for image output.
//!
//! ## Modules
//!
//! - [`types`]: `Vec3` vector math
//! - [`camera`]: look-at poses, pinhole rays, random and orbit views
//! - [`schedule`]: `ScheduleSpec` and the `LossWeights` table
//! - [`noise`]: discrete diffusion noise schedules
//! - [`random`]: the per-step `RandPair`
//! - [`hash`]: FNV-1a hashing
//! - [`panel`]: image panel descriptors
//! - [`error`]: error types
//!
//! ## Usage
//!
//! ```ignore
//! use lift3d_core::prelude::*;
//!
//! let weight = ScheduleSpec::linear_steps(0, 10.0, 1000.0, 5000);
//! assert_eq!(weight.resolve(0, 5000)?, 1000.0);
//!
//! let view = CameraView::new(15.0, 0.0, 1.5, 60.0);
//! let rays = view.ray_directions(64, 64);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod camera;
pub mod error;
pub mod hash;
pub mod noise;
pub mod panel;
pub mod random;
pub mod schedule;
pub mod types;

pub use camera::{orbit_views, wrap_azimuth, CameraView, Pose, ViewRanges};
pub use error::{CoreError, Result};
pub use hash::{fnv1a_64, fnv1a_str, hash_with_salt};
pub use noise::{BetaSchedule, NoiseSchedule};
pub use panel::{Colormap, DataFormat, ImagePanel, PanelKind};
pub use random::RandPair;
pub use schedule::{LossWeights, ScheduleSpec};
pub use types::Vec3;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::camera::{orbit_views, CameraView, Pose, ViewRanges};
    pub use crate::error::{CoreError, Result};
    pub use crate::noise::{BetaSchedule, NoiseSchedule};
    pub use crate::panel::{Colormap, DataFormat, ImagePanel, PanelKind};
    pub use crate::random::RandPair;
    pub use crate::schedule::{LossWeights, ScheduleSpec};
    pub use crate::types::Vec3;
}
