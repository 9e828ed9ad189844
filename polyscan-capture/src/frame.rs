//! Depth frames and their release discipline.
//!
//! Frames hold device-side resources. Ownership is the release mechanism:
//! a frame is released exactly once, when it is dropped, on every exit path
//! including errors and panics in downstream processing. Devices that want
//! to track this hand out a [`FrameLease`] with each frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

/// A dense depth image in metres. A value of `0.0` marks an invalid pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub depth: Vec<f32>,
}

impl DepthImage {
    /// An image with every pixel invalid.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: vec![0.0; (width * height) as usize],
        }
    }

    pub fn from_raw(width: u32, height: u32, depth: Vec<f32>) -> Option<Self> {
        (depth.len() == (width * height) as usize).then_some(Self { width, height, depth })
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, u: u32, v: u32) -> f32 {
        self.depth[(v * self.width + u) as usize]
    }

    pub fn valid_pixels(&self) -> usize {
        self.depth.iter().filter(|d| **d > 0.0).count()
    }
}

/// Counts frames a device has handed out and not yet seen released.
#[derive(Debug, Clone, Default)]
pub struct FrameLeases(Arc<AtomicUsize>);

impl FrameLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new outstanding frame.
    pub fn lease(&self) -> FrameLease {
        self.0.fetch_add(1, Ordering::AcqRel);
        FrameLease(Arc::clone(&self.0))
    }

    /// Frames currently alive.
    pub fn outstanding(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Held by a frame; returns its slot to the owning [`FrameLeases`] on drop.
#[derive(Debug)]
pub struct FrameLease(Arc<AtomicUsize>);

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One raw capture from a camera.
#[derive(Debug)]
pub struct DepthFrame {
    pub image: DepthImage,
    /// Frame number as counted by the device.
    pub frame_number: u64,
    /// Time since the device started streaming.
    pub timestamp: Duration,
    lease: Option<FrameLease>,
}

impl DepthFrame {
    pub fn new(image: DepthImage, frame_number: u64, timestamp: Duration) -> Self {
        Self {
            image,
            frame_number,
            timestamp,
            lease: None,
        }
    }

    /// Tie this frame's lifetime to a device's lease counter.
    pub fn with_lease(mut self, lease: FrameLease) -> Self {
        self.lease = Some(lease);
        self
    }
}

impl Drop for DepthFrame {
    fn drop(&mut self) {
        trace!("Releasing depth frame {}", self.frame_number);
    }
}

/// The result of running a device's filter chain over a burst of frames.
#[derive(Debug)]
pub struct FilteredFrame {
    pub image: DepthImage,
    /// How many raw frames went into this one.
    pub source_frames: usize,
    lease: Option<FrameLease>,
}

impl FilteredFrame {
    pub fn new(image: DepthImage, source_frames: usize) -> Self {
        Self {
            image,
            source_frames,
            lease: None,
        }
    }

    pub fn with_lease(mut self, lease: FrameLease) -> Self {
        self.lease = Some(lease);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leases_are_returned_on_drop() {
        let leases = FrameLeases::new();
        let a = DepthFrame::new(DepthImage::empty(2, 2), 0, Duration::ZERO).with_lease(leases.lease());
        let b = FilteredFrame::new(DepthImage::empty(2, 2), 1).with_lease(leases.lease());
        assert_eq!(leases.outstanding(), 2);

        drop(a);
        assert_eq!(leases.outstanding(), 1);
        drop(b);
        assert_eq!(leases.outstanding(), 0);
    }

    #[test]
    fn test_leases_are_returned_on_panic() {
        let leases = FrameLeases::new();
        let frame_leases = leases.clone();
        let result = std::panic::catch_unwind(move || {
            let _frame = DepthFrame::new(DepthImage::empty(1, 1), 0, Duration::ZERO)
                .with_lease(frame_leases.lease());
            panic!("downstream processing failed");
        });
        assert!(result.is_err());
        assert_eq!(leases.outstanding(), 0);
    }

    #[test]
    fn test_from_raw_checks_size() {
        assert!(DepthImage::from_raw(2, 2, vec![0.0; 3]).is_none());
        let image = DepthImage::from_raw(2, 1, vec![0.0, 1.5]).unwrap();
        assert_eq!(image.get(1, 0), 1.5);
        assert_eq!(image.valid_pixels(), 1);
    }
}
