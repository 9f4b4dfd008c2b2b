//! Host-side camera poses and pinhole ray generation.
//!
//! Cameras sit on a sphere around the origin, parameterized by elevation,
//! azimuth and distance, and always look at the origin with +Z as up. Ray
//! directions follow the OpenGL convention (camera looks down -Z in its own
//! frame).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::Vec3;

/// Camera pose in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Camera position in world coordinates.
    pub position: Vec3,
    /// Forward direction (normalized).
    pub forward: Vec3,
    /// Up direction (normalized).
    pub up: Vec3,
    /// Right direction (forward x up).
    pub right: Vec3,
}

impl Pose {
    /// Create a pose from a position and a look-at target.
    ///
    /// Falls back to +X as the up hint when looking straight along `up`.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let hint = if forward.cross(up).length() < 1e-6 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            up
        };
        let right = forward.cross(hint).normalize();
        let up = right.cross(forward).normalize();

        Self {
            position,
            forward,
            up,
            right,
        }
    }

    /// Pose on a sphere around the origin, looking at the origin.
    pub fn from_spherical(elevation_deg: f32, azimuth_deg: f32, distance: f32) -> Self {
        let position = Vec3::from_spherical_deg(elevation_deg, azimuth_deg) * distance;
        Self::look_at(position, Vec3::splat(0.0), Vec3::UP)
    }

    /// Transform a camera-space direction (x right, y up, -z forward) to world space.
    #[inline]
    pub fn transform_direction(&self, dir: Vec3) -> Vec3 {
        self.right * dir.x + self.up * dir.y - self.forward * dir.z
    }
}

/// A fully specified camera view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Elevation above the XY plane in degrees.
    pub elevation_deg: f32,
    /// Azimuth from +X towards +Y in degrees, in `[-180, 180)`.
    pub azimuth_deg: f32,
    /// Distance from the origin.
    pub distance: f32,
    /// Vertical field of view in degrees.
    pub fovy_deg: f32,
}

impl CameraView {
    /// Create a view.
    pub fn new(elevation_deg: f32, azimuth_deg: f32, distance: f32, fovy_deg: f32) -> Self {
        Self {
            elevation_deg,
            azimuth_deg: wrap_azimuth(azimuth_deg),
            distance,
            fovy_deg,
        }
    }

    /// The look-at pose of this view.
    pub fn pose(&self) -> Pose {
        Pose::from_spherical(self.elevation_deg, self.azimuth_deg, self.distance)
    }

    /// Per-pixel ray directions (normalized, row-major) at the given resolution.
    pub fn ray_directions(&self, width: usize, height: usize) -> Vec<Vec3> {
        let pose = self.pose();
        let focal = 0.5 * height as f32 / (0.5 * self.fovy_deg.to_radians()).tan();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;

        let mut dirs = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let camera_dir = Vec3::new(
                    (x as f32 + 0.5 - cx) / focal,
                    -(y as f32 + 0.5 - cy) / focal,
                    -1.0,
                );
                dirs.push(pose.transform_direction(camera_dir).normalize());
            }
        }
        dirs
    }
}

/// Wrap an azimuth in degrees into `[-180, 180)`.
pub fn wrap_azimuth(azimuth_deg: f32) -> f32 {
    (azimuth_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Sampling ranges for random training views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewRanges {
    /// Elevation range in degrees.
    pub elevation_range: (f32, f32),
    /// Azimuth range in degrees.
    pub azimuth_range: (f32, f32),
    /// Camera distance range.
    pub distance_range: (f32, f32),
    /// Vertical field of view range in degrees.
    pub fovy_range: (f32, f32),
}

impl Default for ViewRanges {
    fn default() -> Self {
        Self {
            elevation_range: (-10.0, 90.0),
            azimuth_range: (-180.0, 180.0),
            distance_range: (1.0, 1.5),
            fovy_range: (40.0, 70.0),
        }
    }
}

impl ViewRanges {
    /// Check that every range is ordered and physically meaningful.
    pub fn validate(&self) -> Result<()> {
        for (min, max) in [
            self.elevation_range,
            self.azimuth_range,
            self.distance_range,
            self.fovy_range,
        ] {
            if !(min <= max) {
                return Err(CoreError::InvalidRange { min, max });
            }
        }
        if self.elevation_range.0 < -90.0 || self.elevation_range.1 > 90.0 {
            return Err(CoreError::InvalidParameter {
                message: "elevation must stay within [-90, 90] degrees".to_string(),
            });
        }
        if self.distance_range.0 <= 0.0 {
            return Err(CoreError::InvalidParameter {
                message: "camera distance must be positive".to_string(),
            });
        }
        if self.fovy_range.0 <= 0.0 || self.fovy_range.1 >= 180.0 {
            return Err(CoreError::InvalidParameter {
                message: "field of view must be within (0, 180) degrees".to_string(),
            });
        }
        Ok(())
    }

    /// Draw one random view.
    pub fn sample_view<R: Rng + ?Sized>(&self, rng: &mut R) -> CameraView {
        CameraView::new(
            sample_range(rng, self.elevation_range),
            sample_range(rng, self.azimuth_range),
            sample_range(rng, self.distance_range),
            sample_range(rng, self.fovy_range),
        )
    }
}

fn sample_range<R: Rng + ?Sized>(rng: &mut R, (min, max): (f32, f32)) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Views evenly spaced in azimuth over `[-180, 180)` at a fixed elevation.
pub fn orbit_views(num_views: usize, elevation_deg: f32, distance: f32, fovy_deg: f32) -> Vec<CameraView> {
    (0..num_views)
        .map(|i| {
            let azimuth = -180.0 + 360.0 * i as f32 / num_views as f32;
            CameraView::new(elevation_deg, azimuth, distance, fovy_deg)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pose_looks_at_origin() {
        let pose = Pose::from_spherical(30.0, 45.0, 2.0);
        assert!((pose.position.length() - 2.0).abs() < 1e-5);
        let to_origin = (-pose.position).normalize();
        assert!((pose.forward.dot(to_origin) - 1.0).abs() < 1e-5);
        assert!(pose.right.dot(pose.forward).abs() < 1e-5);
        assert!(pose.up.dot(pose.forward).abs() < 1e-5);
    }

    #[test]
    fn test_pose_at_pole_is_finite() {
        let pose = Pose::from_spherical(90.0, 0.0, 1.5);
        assert!(pose.right.length() > 0.99);
        assert!(pose.up.length() > 0.99);
    }

    #[test]
    fn test_center_ray_points_forward() {
        let view = CameraView::new(20.0, -60.0, 1.2, 60.0);
        let dirs = view.ray_directions(3, 3);
        assert_eq!(dirs.len(), 9);
        let center = dirs[4];
        assert!((center.dot(view.pose().forward) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_image_top_is_up() {
        let view = CameraView::new(0.0, 0.0, 1.0, 60.0);
        let dirs = view.ray_directions(2, 2);
        // Row 0 is the top of the image and should point above the horizon.
        assert!(dirs[0].z > 0.0);
        assert!(dirs[2].z < 0.0);
    }

    #[test]
    fn test_wrap_azimuth() {
        assert_eq!(wrap_azimuth(190.0), -170.0);
        assert_eq!(wrap_azimuth(-180.0), -180.0);
        assert_eq!(wrap_azimuth(180.0), -180.0);
        assert_eq!(wrap_azimuth(45.0), 45.0);
    }

    #[test]
    fn test_sample_within_ranges() {
        let ranges = ViewRanges::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let view = ranges.sample_view(&mut rng);
            assert!((-10.0..=90.0).contains(&view.elevation_deg));
            assert!((1.0..=1.5).contains(&view.distance));
            assert!((-180.0..180.0).contains(&view.azimuth_deg));
        }
    }

    #[test]
    fn test_orbit_views() {
        let views = orbit_views(4, 15.0, 1.5, 70.0);
        let azimuths: Vec<f32> = views.iter().map(|v| v.azimuth_deg).collect();
        assert_eq!(azimuths, vec![-180.0, -90.0, 0.0, 90.0]);
    }

    #[test]
    fn test_invalid_ranges() {
        let ranges = ViewRanges {
            distance_range: (2.0, 1.0),
            ..ViewRanges::default()
        };
        assert!(ranges.validate().is_err());
    }
}
