//! A depth camera positioned around the scanned object.

use crate::frame::{DepthFrame, FilteredFrame};
use crate::source::{CaptureError, DepthDevice};
use glam::{Quat, Vec3};
use parking_lot::Mutex;
use polyscan_data::PointCloud;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Sensing technology of a camera. Decides whether it may capture
/// alongside other cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraType {
    /// Passive/active stereo. Stereo cameras do not disturb each other.
    StereoDepth,
    /// Time-of-flight LiDAR.
    Lidar,
    /// Structured/coded light projector.
    CodedLight,
}

impl CameraType {
    /// LiDAR and coded-light emitters interfere with every other sensor, so
    /// they must capture alone.
    pub fn is_exclusive(self) -> bool {
        matches!(self, CameraType::Lidar | CameraType::CodedLight)
    }

    /// Nominal horizontal field of view in radians.
    pub fn default_field_of_view(self) -> f32 {
        match self {
            CameraType::StereoDepth => 87f32.to_radians(),
            CameraType::Lidar => 70f32.to_radians(),
            CameraType::CodedLight => 69f32.to_radians(),
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraType::StereoDepth => "stereo-depth",
            CameraType::Lidar => "LiDAR",
            CameraType::CodedLight => "coded-light",
        };
        f.write_str(name)
    }
}

/// One physical sensor with its pose around the object.
///
/// Cloning a `Camera` yields another handle to the same device; captures on
/// either handle are serialized by the device lock.
#[derive(Clone)]
pub struct Camera {
    serial: String,
    camera_type: CameraType,
    on: bool,
    angle: f32,
    field_of_view: f32,
    position_deviation: Vec3,
    device: Arc<Mutex<Box<dyn DepthDevice>>>,
}

impl Camera {
    /// Wrap a discovered device. The camera starts enabled, with the
    /// type's nominal field of view and no position deviation.
    pub fn new(device: impl DepthDevice + 'static, camera_type: CameraType, angle: f32) -> Self {
        Self::from_boxed(Box::new(device), camera_type, angle)
    }

    pub fn from_boxed(device: Box<dyn DepthDevice>, camera_type: CameraType, angle: f32) -> Self {
        Self {
            serial: device.serial().to_string(),
            camera_type,
            on: true,
            angle,
            field_of_view: camera_type.default_field_of_view(),
            position_deviation: Vec3::ZERO,
            device: Arc::new(Mutex::new(device)),
        }
    }

    pub fn with_field_of_view(mut self, field_of_view: f32) -> Self {
        self.field_of_view = field_of_view;
        self
    }

    pub fn with_position_deviation(mut self, deviation: Vec3) -> Self {
        self.position_deviation = deviation;
        self
    }

    pub fn with_enabled(mut self, on: bool) -> Self {
        self.on = on;
        self
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn camera_type(&self) -> CameraType {
        self.camera_type
    }

    /// Whether this camera takes part in scans.
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    /// Azimuth around the object in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    pub fn position_deviation(&self) -> Vec3 {
        self.position_deviation
    }

    /// Only calibration should move this.
    pub fn set_position_deviation(&mut self, deviation: Vec3) {
        self.position_deviation = deviation;
    }

    /// Capture `dummy_frame_count` warm-up frames, released immediately,
    /// then `frame_count` frames that are returned to the caller.
    ///
    /// Holds the device for the whole burst.
    #[tracing::instrument(skip(self), fields(camera = %self.serial))]
    pub fn capture_frames(
        &self,
        frame_count: usize,
        dummy_frame_count: usize,
    ) -> Result<Vec<DepthFrame>, CaptureError> {
        let mut device = self.device.lock();
        let start = Instant::now();

        for _ in 0..dummy_frame_count {
            let warmup = device.capture_frame()?;
            trace!("Discarding warm-up frame {}", warmup.frame_number);
        }

        let mut frames = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            frames.push(device.capture_frame()?);
        }

        debug!(
            "Captured {} frames ({} warm-up) in {:.3}s",
            frames.len(),
            dummy_frame_count,
            start.elapsed().as_secs_f64()
        );
        Ok(frames)
    }

    /// Run the device filter chain. The caller still owns `frames` and
    /// should drop them once this returns.
    pub fn apply_filters(&self, frames: &[DepthFrame]) -> Result<FilteredFrame, CaptureError> {
        self.device.lock().filter(frames)
    }

    /// Project a filtered frame to camera-local points.
    pub fn to_point_cloud(&self, frame: &FilteredFrame) -> Result<PointCloud, CaptureError> {
        self.device.lock().project(frame)
    }

    /// Rotation taking camera-local points into the rig frame.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.angle)
    }

    /// Move a camera-local cloud into the rig frame in place: shift by the
    /// calibrated deviation, then rotate about the vertical axis by the
    /// camera's azimuth.
    pub fn adjust_and_rotate(&self, cloud: &mut PointCloud) {
        let rotation = self.rotation();
        let deviation = self.position_deviation;
        cloud.transform_in_place(|p| rotation * (p + deviation));
    }

    /// Azimuth past which this camera's points are considered covered by
    /// `other`.
    ///
    /// If the two fields of view do not meet, this is a quarter turn signed
    /// towards `other`, which never narrows a sector. Otherwise it is the
    /// middle of the overlapping wedge, so the result is not symmetric when
    /// the fields of view differ.
    pub fn find_critical_angle(&self, other: &Camera) -> f32 {
        let offset = wrap_angle(other.angle - self.angle);
        let sign = if offset < 0.0 { -1.0 } else { 1.0 };
        let reach = (self.field_of_view + other.field_of_view) / 2.0;
        if offset.abs() >= reach {
            return sign * FRAC_PI_2;
        }
        (offset + sign * (self.field_of_view - other.field_of_view) / 2.0) / 2.0
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("serial", &self.serial)
            .field("camera_type", &self.camera_type)
            .field("on", &self.on)
            .field("angle", &self.angle)
            .field("field_of_view", &self.field_of_view)
            .field("position_deviation", &self.position_deviation)
            .finish_non_exhaustive()
    }
}

/// Wrap to (-PI, PI].
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
