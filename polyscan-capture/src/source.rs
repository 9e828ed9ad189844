//! The boundary to the camera vendor's SDK.

use crate::frame::{DepthFrame, FilteredFrame};
use polyscan_data::PointCloud;
use std::time::Duration;
use thiserror::Error;

/// Hardware errors raised while talking to a depth device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {0} disconnected")]
    Disconnected(String),

    #[error("Device {serial} timed out after {timeout:?}")]
    Timeout { serial: String, timeout: Duration },

    #[error("Failed to capture frame: {0}")]
    CaptureFailed(String),

    #[error("Filter chain failed: {0}")]
    FilterFailed(String),

    #[error("Depth projection failed: {0}")]
    ProjectionFailed(String),
}

/// Capabilities a depth sensor driver must provide.
///
/// Implementations block the calling thread while talking to hardware. A
/// device is only ever driven by one task at a time; [`Camera`](crate::Camera)
/// enforces this with a lock.
pub trait DepthDevice: Send {
    /// Stable identity of the device (usually the serial number).
    fn serial(&self) -> &str;

    /// Acquire one raw depth frame.
    fn capture_frame(&mut self) -> Result<DepthFrame, CaptureError>;

    /// Run the device's noise/alignment filter chain over a burst of frames,
    /// producing one filtered frame. The input frames are only borrowed.
    fn filter(&mut self, frames: &[DepthFrame]) -> Result<FilteredFrame, CaptureError>;

    /// Convert a filtered frame to camera-local 3D points.
    fn project(&self, frame: &FilteredFrame) -> Result<PointCloud, CaptureError>;
}
