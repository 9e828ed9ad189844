//! Per-camera mounting offsets from a reference surface.
//!
//! Each camera looks at a surface whose center should sit at
//! `(0, 0, distance)` in its own frame. The difference between that and the
//! centroid it actually sees becomes its position deviation.

use crate::error::TaskError;
use crate::scheduler::FrameMapper;
use glam::Vec3;
use polyscan_capture::{Camera, DepthFrame};
use polyscan_data::{CalibrationSurface, Point};
use tracing::debug;

/// A camera's measured offset, not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDeviation {
    pub serial: String,
    pub deviation: Vec3,
}

/// Offset that moves `centroid` onto the surface center.
pub fn deviation_from_centroid(centroid: Point, distance: f32) -> Vec3 {
    Vec3::new(-centroid.x, -centroid.y, distance - centroid.z)
}

/// Filter and project a reference scan, without any pose transform, and
/// reduce it to a deviation.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationMapper {
    pub surface: CalibrationSurface,
}

impl CalibrationMapper {
    pub fn new(surface: CalibrationSurface) -> Self {
        Self { surface }
    }
}

impl FrameMapper for CalibrationMapper {
    type Output = CameraDeviation;

    fn map(&self, camera: &Camera, frames: Vec<DepthFrame>) -> Result<CameraDeviation, TaskError> {
        let filtered = camera.apply_filters(&frames)?;
        drop(frames);
        let cloud = camera.to_point_cloud(&filtered)?;
        drop(filtered);

        let centroid = cloud.centroid().ok_or(TaskError::EmptyReference)?;
        let deviation = deviation_from_centroid(centroid, self.surface.distance);
        debug!(
            "Camera {}: centroid {:?} over {} points, deviation {:?}",
            camera.serial(),
            centroid,
            cloud.len(),
            deviation
        );

        Ok(CameraDeviation {
            serial: camera.serial().to_string(),
            deviation,
        })
    }
}
