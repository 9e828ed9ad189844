//! Polyscan Capture - depth cameras and the SDK boundary
//!
//! This crate wraps physical depth sensors behind the [`DepthDevice`] trait
//! and layers the per-camera pose on top in [`Camera`]:
//!
//! - [`DepthDevice`]: what the vendor SDK must provide (capture, filter, project)
//! - [`Camera`]: one enabled/disabled sensor with its azimuth and calibration offset
//! - [`DepthFrame`] / [`FilteredFrame`]: scoped frame ownership, released on drop
//! - Simulated devices (requires the `synthetic` feature, on by default)
//!
//! ## Example
//!
//! ```ignore
//! use polyscan_capture::{Camera, CameraType, SyntheticDevice, SyntheticScene};
//!
//! let device = SyntheticDevice::new("sim-0", SyntheticScene::default());
//! let camera = Camera::new(device, CameraType::StereoDepth, 0.0);
//! let frames = camera.capture_frames(15, 30)?;
//! let filtered = camera.apply_filters(&frames)?;
//! drop(frames);
//! let mut cloud = camera.to_point_cloud(&filtered)?;
//! camera.adjust_and_rotate(&mut cloud);
//! ```

mod camera;
mod filters;
mod frame;
mod intrinsics;
mod source;

#[cfg(feature = "synthetic")]
mod synthetic;

pub use camera::{Camera, CameraType};
pub use filters::{DepthFilter, FilterChain};
pub use frame::{DepthFrame, DepthImage, FilteredFrame, FrameLease, FrameLeases};
pub use intrinsics::PinholeIntrinsics;
pub use source::{CaptureError, DepthDevice};

#[cfg(feature = "synthetic")]
pub use synthetic::{SyntheticDevice, SyntheticScene};
