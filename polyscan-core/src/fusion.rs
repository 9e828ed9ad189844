//! Merging per-camera clouds into one.
//!
//! This is overlap trimming, not registration: cameras are assumed to sit at
//! known azimuths around the object, and each one's cloud is cut down to an
//! angular sector before everything is concatenated.

use crate::error::TaskError;
use crate::scheduler::FrameMapper;
use polyscan_capture::{Camera, DepthFrame};
use polyscan_data::{Point, PointCloud};
use std::f32::consts::FRAC_PI_2;
use tracing::{debug, info};

/// One camera's contribution to a scan, already in the rig frame.
#[derive(Debug, Clone)]
pub struct CameraCloud {
    pub camera: Camera,
    pub cloud: PointCloud,
}

/// Filter, project and pose-adjust each camera's frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanMapper;

impl FrameMapper for ScanMapper {
    type Output = CameraCloud;

    fn map(&self, camera: &Camera, frames: Vec<DepthFrame>) -> Result<CameraCloud, TaskError> {
        let filtered = camera.apply_filters(&frames)?;
        drop(frames);
        let mut cloud = camera.to_point_cloud(&filtered)?;
        drop(filtered);
        camera.adjust_and_rotate(&mut cloud);
        debug!("Camera {} contributed {} points", camera.serial(), cloud.len());
        Ok(CameraCloud {
            camera: camera.clone(),
            cloud,
        })
    }
}

/// The angular measure points are clipped on: `atan(z / x)`, in
/// `[-PI/2, PI/2]`. Points with `x == z == 0` have no measure (NaN).
pub fn azimuth_measure(p: Point) -> f32 {
    (p.z / p.x).atan()
}

/// Inclusive range of [`azimuth_measure`] a camera keeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorBounds {
    pub lower: f32,
    pub upper: f32,
}

impl SectorBounds {
    /// Everything with a defined measure.
    pub const FULL: SectorBounds = SectorBounds {
        lower: -FRAC_PI_2,
        upper: FRAC_PI_2,
    };

    /// Apply critical angles to the full range. A lower angle only counts
    /// when negative and an upper one only when positive; anything else
    /// leaves that side at a quarter turn.
    pub fn from_critical_angles(lower: f32, upper: f32) -> Self {
        Self {
            lower: if lower < 0.0 { lower } else { -FRAC_PI_2 },
            upper: if upper > 0.0 { upper } else { FRAC_PI_2 },
        }
    }

    /// Both sides are taken from the critical angle against the
    /// predecessor.
    pub fn for_camera(camera: &Camera, predecessor: &Camera) -> Self {
        let lower = camera.find_critical_angle(predecessor);
        let upper = camera.find_critical_angle(predecessor);
        Self::from_critical_angles(lower, upper)
    }

    pub fn contains(&self, p: Point) -> bool {
        let measure = azimuth_measure(p);
        self.lower <= measure && measure <= self.upper
    }

    /// Drop points outside the sector, keeping the order of the rest.
    pub fn clip(&self, cloud: &mut PointCloud) {
        cloud.retain(|p| self.contains(*p));
    }
}

/// `(predecessor, successor)` of index `i` in a ring of `n`.
pub fn circular_neighbours(i: usize, n: usize) -> (usize, usize) {
    ((i + n - 1) % n, (i + 1) % n)
}

/// Sort by azimuth, clip each cloud to its sector and concatenate.
///
/// With `verbose` set, per-camera bounds and counts are logged at info level.
pub fn merge_point_clouds(mut clouds: Vec<CameraCloud>, verbose: bool) -> PointCloud {
    clouds.sort_by(|a, b| a.camera.angle().total_cmp(&b.camera.angle()));
    let n = clouds.len();

    let bounds: Vec<SectorBounds> = (0..n)
        .map(|k| {
            let angle = clouds[k].camera.angle();
            // Cameras sharing an azimuth all resolve to the first of them.
            let i = clouds
                .iter()
                .position(|c| c.camera.angle() == angle)
                .unwrap_or(k);
            let (before, _after) = circular_neighbours(i, n);
            SectorBounds::for_camera(&clouds[k].camera, &clouds[before].camera)
        })
        .collect();

    let total = clouds.iter().map(|c| c.cloud.len()).sum();
    let mut merged = PointCloud::with_capacity(total);

    for (CameraCloud { camera, mut cloud }, sector) in clouds.into_iter().zip(bounds) {
        let captured = cloud.len();
        sector.clip(&mut cloud);
        if verbose {
            info!(
                "Camera {} at {:.3} rad: kept {} of {} points in [{:.3}, {:.3}]",
                camera.serial(),
                camera.angle(),
                cloud.len(),
                captured,
                sector.lower,
                sector.upper
            );
        } else {
            debug!("Camera {}: kept {} of {} points", camera.serial(), cloud.len(), captured);
        }
        merged.append(cloud);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use polyscan_capture::{CameraType, SyntheticDevice, SyntheticScene};
    use std::f32::consts::PI;

    fn camera(serial: &str, angle: f32) -> Camera {
        Camera::new(
            SyntheticDevice::new(serial, SyntheticScene::default()),
            CameraType::StereoDepth,
            angle,
        )
    }

    #[test]
    fn test_sign_gated_bounds() {
        assert_eq!(SectorBounds::from_critical_angles(0.3, 0.3), SectorBounds {
            lower: -FRAC_PI_2,
            upper: 0.3
        });
        assert_eq!(SectorBounds::from_critical_angles(-0.3, -0.3), SectorBounds {
            lower: -0.3,
            upper: FRAC_PI_2
        });
        assert_eq!(SectorBounds::from_critical_angles(0.0, 0.0), SectorBounds::FULL);
    }

    #[test]
    fn test_bounds_use_predecessor_only() {
        // Successor overlaps heavily, predecessor is far away: no tightening.
        let cam = camera("mid", 0.0);
        let predecessor = camera("pred", -2.0);
        assert_eq!(SectorBounds::for_camera(&cam, &predecessor), SectorBounds::FULL);

        let close = camera("close", -0.4);
        let bounds = SectorBounds::for_camera(&cam, &close);
        assert!((bounds.lower + 0.2).abs() < 1e-6);
        assert_eq!(bounds.upper, FRAC_PI_2);
    }

    #[test]
    fn test_clip_is_idempotent() {
        let sector = SectorBounds { lower: -0.3, upper: 0.7 };
        let mut cloud = PointCloud::new(
            (0..40)
                .map(|i| {
                    let a = i as f32 * 0.17;
                    Vec3::new(a.cos(), 0.1 * i as f32, a.sin())
                })
                .collect(),
        );
        sector.clip(&mut cloud);
        let once = cloud.clone();
        sector.clip(&mut cloud);
        assert_eq!(cloud, once);
        assert!(!once.is_empty());
    }

    #[test]
    fn test_points_without_measure_are_dropped() {
        let mut cloud = PointCloud::new(vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)]);
        SectorBounds::FULL.clip(&mut cloud);
        assert_eq!(cloud.points, vec![Vec3::new(0.0, 0.0, 1.0)]);
    }

    #[test]
    fn test_neighbours_wrap() {
        assert_eq!(circular_neighbours(0, 3), (2, 1));
        assert_eq!(circular_neighbours(2, 3), (1, 0));
        assert_eq!(circular_neighbours(0, 1), (0, 0));
    }

    #[test]
    fn test_three_way_ring_keeps_everything_in_angle_order() {
        let clouds = |cam: &Camera| -> PointCloud {
            let a = cam.angle();
            PointCloud::new(vec![
                Vec3::new(1.0 + a, 0.0, 0.5),
                Vec3::new(-1.0, a, 2.0),
                Vec3::new(0.3, -a, -0.7),
            ])
        };
        let a = camera("a", 0.0);
        let b = camera("b", 2.0 * PI / 3.0);
        let c = camera("c", 4.0 * PI / 3.0);

        let input = vec![
            CameraCloud { cloud: clouds(&c), camera: c.clone() },
            CameraCloud { cloud: clouds(&a), camera: a.clone() },
            CameraCloud { cloud: clouds(&b), camera: b.clone() },
        ];

        let merged = merge_point_clouds(input, false);

        let mut expected = clouds(&a);
        expected.append(clouds(&b));
        expected.append(clouds(&c));
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_overlapping_neighbour_trims_lower_side() {
        let a = camera("a", 0.0);
        let b = camera("b", 0.4);
        // b's predecessor is a (0.2 rad below), so b keeps measures >= -0.2.
        let cloud = PointCloud::new(vec![
            Vec3::new(1.0, 0.0, -1.0), // -PI/4: dropped
            Vec3::new(1.0, 0.0, 0.0),  // 0: kept
            Vec3::new(1.0, 0.0, 1.0),  // PI/4: kept
        ]);
        let merged = merge_point_clouds(
            vec![CameraCloud { camera: b, cloud }, CameraCloud { camera: a, cloud: PointCloud::default() }],
            true,
        );
        assert_eq!(merged.points, vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_point_clouds(Vec::new(), false).is_empty());
    }
}
