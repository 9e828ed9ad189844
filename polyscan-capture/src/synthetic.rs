//! Simulated depth devices.
//!
//! A [`SyntheticDevice`] ray-casts a known scene through a pinhole model, so
//! a whole rig can be exercised without hardware. A mounting offset can be
//! set to mimic a camera that is not where the rig thinks it is; calibration
//! should recover that offset.

use crate::camera::CameraType;
use crate::filters::FilterChain;
use crate::frame::{DepthFrame, DepthImage, FilteredFrame, FrameLeases};
use crate::intrinsics::PinholeIntrinsics;
use crate::source::{CaptureError, DepthDevice};
use glam::Vec3;
use polyscan_data::{CalibrationSurface, PointCloud};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What a synthetic device sees, in the nominal (unshifted) camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticScene {
    /// A flat rectangle facing the camera, centred on the optical axis.
    Surface { width: f32, height: f32, distance: f32 },
    /// A sphere anywhere in front of the camera.
    Sphere { center: Vec3, radius: f32 },
}

impl SyntheticScene {
    /// The calibration reference as each camera should see it.
    pub fn calibration(surface: &CalibrationSurface) -> Self {
        SyntheticScene::Surface {
            width: surface.width,
            height: surface.height,
            distance: surface.distance,
        }
    }

    /// Depth along the optical axis where `ray` (with `ray.z == 1`) first
    /// hits the scene, for a camera displaced by `offset`.
    fn hit_depth(&self, ray: Vec3, offset: Vec3) -> Option<f32> {
        match *self {
            SyntheticScene::Surface { width, height, distance } => {
                let z = distance - offset.z;
                if z <= 0.0 {
                    return None;
                }
                let hit = ray * z;
                let inside = (hit.x + offset.x).abs() <= width / 2.0
                    && (hit.y + offset.y).abs() <= height / 2.0;
                inside.then_some(z)
            }
            SyntheticScene::Sphere { center, radius } => {
                let c = center - offset;
                let a = ray.dot(ray);
                let b = -2.0 * ray.dot(c);
                let k = c.dot(c) - radius * radius;
                let disc = b * b - 4.0 * a * k;
                if disc < 0.0 {
                    return None;
                }
                let t = (-b - disc.sqrt()) / (2.0 * a);
                (t > 0.0).then_some(t)
            }
        }
    }
}

impl Default for SyntheticScene {
    fn default() -> Self {
        SyntheticScene::Sphere {
            center: Vec3::new(0.0, 0.0, 0.6),
            radius: 0.15,
        }
    }
}

/// A depth device that renders a [`SyntheticScene`].
pub struct SyntheticDevice {
    serial: String,
    intrinsics: PinholeIntrinsics,
    filters: FilterChain,
    scene: SyntheticScene,
    mount_offset: Vec3,
    frame_interval: Duration,
    disconnect_after: Option<u64>,
    frames_captured: u64,
    started: Instant,
    leases: FrameLeases,
}

impl SyntheticDevice {
    /// A 64x48 stereo-depth device.
    pub fn new(serial: impl Into<String>, scene: SyntheticScene) -> Self {
        let camera_type = CameraType::StereoDepth;
        Self {
            serial: serial.into(),
            intrinsics: PinholeIntrinsics::from_fov(64, 48, camera_type.default_field_of_view()),
            filters: FilterChain::for_camera_type(camera_type),
            scene,
            mount_offset: Vec3::ZERO,
            frame_interval: Duration::ZERO,
            disconnect_after: None,
            frames_captured: 0,
            started: Instant::now(),
            leases: FrameLeases::new(),
        }
    }

    /// Use the filter chain and nominal field of view of `camera_type`.
    pub fn with_camera_type(mut self, camera_type: CameraType) -> Self {
        self.filters = FilterChain::for_camera_type(camera_type);
        self.intrinsics = PinholeIntrinsics::from_fov(
            self.intrinsics.width,
            self.intrinsics.height,
            camera_type.default_field_of_view(),
        );
        self
    }

    pub fn with_intrinsics(mut self, intrinsics: PinholeIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Pretend the camera is mounted `offset` away from its nominal spot.
    pub fn with_mount_offset(mut self, offset: Vec3) -> Self {
        self.mount_offset = offset;
        self
    }

    /// Sleep this long per frame to mimic the sensor's frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Fail every capture after `frames` frames have been delivered.
    pub fn disconnect_after(mut self, frames: u64) -> Self {
        self.disconnect_after = Some(frames);
        self
    }

    /// Handle for checking how many frames are still alive.
    pub fn leases(&self) -> FrameLeases {
        self.leases.clone()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn render(&self) -> DepthImage {
        let k = &self.intrinsics;
        let mut image = DepthImage::empty(k.width, k.height);
        for v in 0..k.height {
            for u in 0..k.width {
                if let Some(z) = self.scene.hit_depth(k.ray(u, v), self.mount_offset) {
                    image.depth[(v * k.width + u) as usize] = z;
                }
            }
        }
        image
    }
}

impl DepthDevice for SyntheticDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn capture_frame(&mut self) -> Result<DepthFrame, CaptureError> {
        if self.disconnect_after.is_some_and(|n| self.frames_captured >= n) {
            warn!("Synthetic device {} dropped off the bus", self.serial);
            return Err(CaptureError::Disconnected(self.serial.clone()));
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }

        self.frames_captured += 1;
        let frame = DepthFrame::new(self.render(), self.frames_captured, self.started.elapsed());
        Ok(frame.with_lease(self.leases.lease()))
    }

    fn filter(&mut self, frames: &[DepthFrame]) -> Result<FilteredFrame, CaptureError> {
        let image = self.filters.apply(frames)?;
        debug!(
            "Filtered {} frames from {}: {} valid pixels",
            frames.len(),
            self.serial,
            image.valid_pixels()
        );
        Ok(FilteredFrame::new(image, frames.len()).with_lease(self.leases.lease()))
    }

    fn project(&self, frame: &FilteredFrame) -> Result<PointCloud, CaptureError> {
        let k = &self.intrinsics;
        if frame.image.dimensions() != (k.width, k.height) {
            return Err(CaptureError::ProjectionFailed(format!(
                "frame is {:?} but intrinsics are {}x{}",
                frame.image.dimensions(),
                k.width,
                k.height
            )));
        }
        Ok(k.deproject(&frame.image))
    }
}
