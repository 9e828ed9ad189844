//! Depth filter chains, one per camera technology.

use crate::camera::CameraType;
use crate::frame::{DepthFrame, DepthImage};
use crate::source::CaptureError;

/// One stage of a filter chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthFilter {
    /// Invalidate depths outside `[min, max]` metres.
    Threshold { min: f32, max: f32 },
    /// Per-pixel mean over all frames where the pixel is valid.
    TemporalAverage,
}

/// An ordered list of filters. Threshold stages run per frame before the
/// temporal average; the average collapses the burst into one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    stages: Vec<DepthFilter>,
}

impl FilterChain {
    pub fn new(stages: Vec<DepthFilter>) -> Self {
        Self { stages }
    }

    /// Working range of each technology, followed by temporal averaging.
    pub fn for_camera_type(camera_type: CameraType) -> Self {
        let (min, max) = match camera_type {
            CameraType::StereoDepth => (0.1, 10.0),
            CameraType::Lidar => (0.25, 9.0),
            CameraType::CodedLight => (0.2, 1.5),
        };
        Self::new(vec![
            DepthFilter::Threshold { min, max },
            DepthFilter::TemporalAverage,
        ])
    }

    pub fn stages(&self) -> &[DepthFilter] {
        &self.stages
    }

    /// Run the chain over a burst of frames.
    pub fn apply(&self, frames: &[DepthFrame]) -> Result<DepthImage, CaptureError> {
        let first = frames
            .first()
            .ok_or_else(|| CaptureError::FilterFailed("no frames to filter".to_string()))?;
        let (width, height) = first.image.dimensions();
        if let Some(bad) = frames.iter().find(|f| f.image.dimensions() != (width, height)) {
            return Err(CaptureError::FilterFailed(format!(
                "frame {} is {:?}, expected {:?}",
                bad.frame_number,
                bad.image.dimensions(),
                (width, height)
            )));
        }

        let mut images: Vec<DepthImage> = frames.iter().map(|f| f.image.clone()).collect();
        for stage in &self.stages {
            match *stage {
                DepthFilter::Threshold { min, max } => {
                    for image in &mut images {
                        threshold(image, min, max);
                    }
                }
                DepthFilter::TemporalAverage => {
                    images = vec![temporal_average(&images, width, height)];
                }
            }
        }

        // Without an averaging stage the most recent frame wins.
        images
            .pop()
            .ok_or_else(|| CaptureError::FilterFailed("filter chain produced no image".to_string()))
    }
}

fn threshold(image: &mut DepthImage, min: f32, max: f32) {
    for d in &mut image.depth {
        if *d < min || *d > max {
            *d = 0.0;
        }
    }
}

fn temporal_average(images: &[DepthImage], width: u32, height: u32) -> DepthImage {
    let mut out = DepthImage::empty(width, height);
    for (i, px) in out.depth.iter_mut().enumerate() {
        let (sum, n) = images
            .iter()
            .map(|img| img.depth[i])
            .filter(|d| *d > 0.0)
            .fold((0.0f32, 0u32), |(s, n), d| (s + d, n + 1));
        if n > 0 {
            *px = sum / n as f32;
        }
    }
    out
}
