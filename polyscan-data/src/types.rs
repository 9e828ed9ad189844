//! Core data types for point clouds and calibration geometry.
//!
//! Points are plain `glam::Vec3` values. Whether a cloud is in camera-local or
//! world space depends on how far it has travelled through the pipeline.

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

/// A single 3D sample.
pub type Point = Vec3;

/// An ordered sequence of points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Append every point of `other`, preserving its order.
    pub fn append(&mut self, mut other: PointCloud) {
        self.points.append(&mut other.points);
    }

    /// Mean position of all points, or `None` for an empty cloud.
    ///
    /// Accumulates in double precision so large scans do not drift.
    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + p.as_dvec3());
        Some((sum / self.points.len() as f64).as_vec3())
    }

    /// Apply `f` to every point in place.
    pub fn transform_in_place(&mut self, f: impl Fn(Point) -> Point) {
        for p in &mut self.points {
            *p = f(*p);
        }
    }

    /// Keep only the points for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Point) -> bool) {
        self.points.retain(keep);
    }
}

impl From<Vec<Point>> for PointCloud {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Extend<Point> for PointCloud {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl IntoIterator for PointCloud {
    type Item = Point;
    type IntoIter = std::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// The known reference object used during calibration.
///
/// Its true center is assumed to sit at `(0, 0, distance)` in every camera's
/// local frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSurface {
    /// Width of the surface.
    pub width: f32,
    /// Height of the surface.
    pub height: f32,
    /// Distance of the surface from the rig center.
    pub distance: f32,
}

impl CalibrationSurface {
    pub fn new(width: f32, height: f32, distance: f32) -> Self {
        Self {
            width,
            height,
            distance,
        }
    }

    /// Where a perfectly mounted camera sees the surface center.
    pub fn expected_center(&self) -> Point {
        Vec3::new(0.0, 0.0, self.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_of_empty_cloud() {
        assert_eq!(PointCloud::default().centroid(), None);
    }

    #[test]
    fn test_centroid() {
        let cloud = PointCloud::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 4.0, 6.0),
            Vec3::new(1.0, 2.0, 3.0),
        ]);
        assert_eq!(cloud.centroid(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut a = PointCloud::new(vec![Vec3::X, Vec3::Y]);
        let b = PointCloud::new(vec![Vec3::Z, Vec3::ONE]);
        a.append(b);
        assert_eq!(a.points, vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE]);
    }

    #[test]
    fn test_transform_in_place() {
        let mut cloud = PointCloud::new(vec![Vec3::X, Vec3::Y]);
        cloud.transform_in_place(|p| p + Vec3::Z);
        assert_eq!(cloud.points, vec![Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 1.0)]);
    }

    #[test]
    fn test_calibration_surface_center() {
        let surface = CalibrationSurface::new(0.3, 0.2, 0.5);
        assert_eq!(surface.expected_center(), Vec3::new(0.0, 0.0, 0.5));
    }
}
