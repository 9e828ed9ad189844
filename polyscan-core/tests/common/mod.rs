#![allow(dead_code)]

use parking_lot::Mutex;
use polyscan_capture::{
    Camera, CameraType, CaptureError, DepthDevice, DepthFrame, FilteredFrame, FrameLeases, SyntheticDevice,
    SyntheticScene,
};
use polyscan_data::PointCloud;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One `capture_frame` call as seen by a [`RecordingDevice`].
#[derive(Debug, Clone)]
pub struct CaptureSpan {
    pub serial: String,
    pub exclusive: bool,
    pub start: Instant,
    pub end: Instant,
}

pub type CaptureLog = Arc<Mutex<Vec<CaptureSpan>>>;

/// Wraps a synthetic device and logs when each frame capture starts and
/// ends. Can be told to fail its captures.
pub struct RecordingDevice {
    inner: SyntheticDevice,
    exclusive: bool,
    log: CaptureLog,
    failing: bool,
}

impl RecordingDevice {
    pub fn new(serial: &str, camera_type: CameraType, log: CaptureLog) -> Self {
        Self {
            inner: SyntheticDevice::new(serial, SyntheticScene::default())
                .with_camera_type(camera_type)
                .with_frame_interval(Duration::from_millis(2)),
            exclusive: camera_type.is_exclusive(),
            log,
            failing: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn leases(&self) -> FrameLeases {
        self.inner.leases()
    }
}

impl DepthDevice for RecordingDevice {
    fn serial(&self) -> &str {
        self.inner.serial()
    }

    fn capture_frame(&mut self) -> Result<DepthFrame, CaptureError> {
        let start = Instant::now();
        let frame = if self.failing {
            std::thread::sleep(Duration::from_millis(2));
            Err(CaptureError::CaptureFailed(format!("{} refused", self.inner.serial())))
        } else {
            self.inner.capture_frame()
        };
        self.log.lock().push(CaptureSpan {
            serial: self.inner.serial().to_string(),
            exclusive: self.exclusive,
            start,
            end: Instant::now(),
        });
        frame
    }

    fn filter(&mut self, frames: &[DepthFrame]) -> Result<FilteredFrame, CaptureError> {
        self.inner.filter(frames)
    }

    fn project(&self, frame: &FilteredFrame) -> Result<PointCloud, CaptureError> {
        self.inner.project(frame)
    }
}

/// A mixed rig: `stereo` stereo cameras, one LiDAR and one coded-light
/// camera, evenly spread around the object. Returns the lease handles in
/// camera order.
pub fn mixed_rig(stereo: usize, log: &CaptureLog) -> (Vec<Camera>, Vec<FrameLeases>) {
    let mut types = vec![CameraType::StereoDepth; stereo];
    types.push(CameraType::Lidar);
    types.push(CameraType::CodedLight);

    let n = types.len();
    let mut cameras = Vec::with_capacity(n);
    let mut leases = Vec::with_capacity(n);
    for (i, camera_type) in types.into_iter().enumerate() {
        let device = RecordingDevice::new(&format!("cam-{i}"), camera_type, Arc::clone(log));
        leases.push(device.leases());
        let angle = i as f32 * std::f32::consts::TAU / n as f32;
        cameras.push(Camera::new(device, camera_type, angle));
    }
    (cameras, leases)
}

/// No exclusive capture overlaps any concurrent capture, and no two
/// exclusive cameras capture at the same time.
pub fn assert_exclusive_isolation(log: &[CaptureSpan]) {
    let last_concurrent = log.iter().filter(|s| !s.exclusive).map(|s| s.end).max();
    let first_exclusive = log.iter().filter(|s| s.exclusive).map(|s| s.start).min();
    if let (Some(last), Some(first)) = (last_concurrent, first_exclusive) {
        assert!(last <= first, "an exclusive capture started before concurrent captures finished");
    }

    let mut exclusive: Vec<&CaptureSpan> = log.iter().filter(|s| s.exclusive).collect();
    exclusive.sort_by_key(|s| s.start);
    for pair in exclusive.windows(2) {
        if pair[0].serial != pair[1].serial {
            assert!(
                pair[0].end <= pair[1].start,
                "{} and {} captured at the same time",
                pair[0].serial,
                pair[1].serial
            );
        }
    }
}
