//! Pinhole depth-to-point projection.

use crate::frame::DepthImage;
use glam::Vec3;
use polyscan_data::PointCloud;

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl PinholeIntrinsics {
    /// Square pixels, principal point at the image center, horizontal field
    /// of view `hfov` in radians.
    pub fn from_fov(width: u32, height: u32, hfov: f32) -> Self {
        let f = (width as f32 / 2.0) / (hfov / 2.0).tan();
        Self {
            width,
            height,
            fx: f,
            fy: f,
            cx: (width as f32 - 1.0) / 2.0,
            cy: (height as f32 - 1.0) / 2.0,
        }
    }

    /// Direction through pixel `(u, v)`, scaled so that `z == 1`.
    pub fn ray(&self, u: u32, v: u32) -> Vec3 {
        Vec3::new((u as f32 - self.cx) / self.fx, (v as f32 - self.cy) / self.fy, 1.0)
    }

    /// Back-project every valid pixel of `image`, row-major.
    pub fn deproject(&self, image: &DepthImage) -> PointCloud {
        let mut cloud = PointCloud::with_capacity(image.valid_pixels());
        for v in 0..image.height {
            for u in 0..image.width {
                let z = image.get(u, v);
                if z > 0.0 {
                    cloud.points.push(self.ray(u, v) * z);
                }
            }
        }
        cloud
    }
}
