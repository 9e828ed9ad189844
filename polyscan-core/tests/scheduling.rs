mod common;

use common::{CaptureLog, RecordingDevice, assert_exclusive_isolation, mixed_rig};
use polyscan_capture::{Camera, CameraType, CaptureError, DepthFrame};
use polyscan_core::{CaptureScheduler, FrameMapper, Partition, TaskError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns each camera's serial and how many frames it was handed.
#[derive(Default)]
struct SerialMapper {
    completed: AtomicUsize,
    fail_on: Option<String>,
    panic_on: Option<String>,
}

impl FrameMapper for SerialMapper {
    type Output = (String, usize);

    fn map(&self, camera: &Camera, frames: Vec<DepthFrame>) -> Result<(String, usize), TaskError> {
        let count = frames.len();
        drop(frames);
        if self.fail_on.as_deref() == Some(camera.serial()) {
            return Err(CaptureError::ProjectionFailed("no points".to_string()).into());
        }
        if self.panic_on.as_deref() == Some(camera.serial()) {
            panic!("mapper gave up on {}", camera.serial());
        }
        std::thread::sleep(Duration::from_millis(5));
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok((camera.serial().to_string(), count))
    }
}

fn serials(results: &[(String, usize)]) -> Vec<&str> {
    results.iter().map(|(s, _)| s.as_str()).collect()
}

#[test]
fn exclusive_captures_wait_for_concurrent_ones() {
    let log = CaptureLog::default();
    let (cameras, leases) = mixed_rig(3, &log);

    let results = CaptureScheduler::new(4, 2)
        .run(&cameras, &SerialMapper::default())
        .unwrap();

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, frames)| *frames == 4));
    assert_eq!(log.lock().len(), 5 * 6);
    assert_exclusive_isolation(&log.lock());
    assert!(leases.iter().all(|l| l.outstanding() == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exclusive_captures_wait_for_concurrent_ones_async() {
    let log = CaptureLog::default();
    let (cameras, leases) = mixed_rig(3, &log);

    let results = CaptureScheduler::new(4, 2)
        .run_async(&cameras, Arc::new(SerialMapper::default()))
        .await
        .unwrap();

    assert_eq!(results.len(), 5);
    assert_exclusive_isolation(&log.lock());
    assert!(leases.iter().all(|l| l.outstanding() == 0));
}

#[test]
fn results_follow_partition_order_and_skip_disabled_cameras() {
    let log = CaptureLog::default();
    let lidar = Camera::new(RecordingDevice::new("lidar", CameraType::Lidar, log.clone()), CameraType::Lidar, 0.0);
    let stereo_a = Camera::new(
        RecordingDevice::new("stereo-a", CameraType::StereoDepth, log.clone()),
        CameraType::StereoDepth,
        1.0,
    );
    let off = Camera::new(
        RecordingDevice::new("off", CameraType::StereoDepth, log.clone()),
        CameraType::StereoDepth,
        2.0,
    )
    .with_enabled(false);
    let coded = Camera::new(
        RecordingDevice::new("coded", CameraType::CodedLight, log.clone()),
        CameraType::CodedLight,
        3.0,
    );
    let stereo_b = Camera::new(
        RecordingDevice::new("stereo-b", CameraType::StereoDepth, log.clone()),
        CameraType::StereoDepth,
        4.0,
    );
    let cameras = vec![lidar, stereo_a, off, coded, stereo_b];

    let partition = Partition::of(&cameras);
    assert_eq!(partition.concurrent, vec![1, 4]);
    assert_eq!(partition.exclusive, vec![0, 3]);

    let results = CaptureScheduler::new(1, 0).run(&cameras, &SerialMapper::default()).unwrap();
    assert_eq!(serials(&results), vec!["stereo-a", "stereo-b", "lidar", "coded"]);
    assert!(log.lock().iter().all(|s| s.serial != "off"));
}

#[test]
fn no_enabled_cameras_is_an_empty_scan() {
    let log = CaptureLog::default();
    let (cameras, _) = mixed_rig(2, &log);
    let cameras: Vec<Camera> = cameras.into_iter().map(|c| c.with_enabled(false)).collect();

    let results = CaptureScheduler::new(3, 1).run(&cameras, &SerialMapper::default()).unwrap();
    assert!(results.is_empty());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn no_cameras_at_all_async() {
    let results = CaptureScheduler::new(3, 1)
        .run_async(&[], Arc::new(SerialMapper::default()))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn concurrent_capture_failure_still_lets_everything_settle() {
    let log = CaptureLog::default();
    let (mut cameras, leases) = mixed_rig(2, &log);
    cameras[0] = Camera::new(
        RecordingDevice::new("broken", CameraType::StereoDepth, log.clone()).failing(),
        CameraType::StereoDepth,
        0.0,
    );

    let mapper = SerialMapper::default();
    let err = CaptureScheduler::new(3, 0).run(&cameras, &mapper).unwrap_err();

    // The other three cameras were captured and mapped before we got here.
    assert_eq!(mapper.completed.load(Ordering::SeqCst), 3);
    assert_eq!(err.total_tasks(), 4);
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.first().serial, "broken");
    assert!(matches!(err.first().error, TaskError::Capture(CaptureError::CaptureFailed(_))));
    assert_exclusive_isolation(&log.lock());
    assert!(leases.iter().all(|l| l.outstanding() == 0));
}

#[test]
fn failed_exclusive_capture_does_not_stop_the_next_one() {
    let log = CaptureLog::default();
    let (mut cameras, _) = mixed_rig(1, &log);
    // Index 1 is the LiDAR camera.
    cameras[1] = Camera::new(
        RecordingDevice::new("lidar", CameraType::Lidar, log.clone()).failing(),
        CameraType::Lidar,
        1.0,
    );

    let mapper = SerialMapper::default();
    let err = CaptureScheduler::new(2, 0).run(&cameras, &mapper).unwrap_err();

    assert_eq!(err.first().serial, "lidar");
    assert_eq!(mapper.completed.load(Ordering::SeqCst), 2);
    assert!(log.lock().iter().any(|s| s.serial == "cam-2"));
}

#[test]
fn mapping_failures_are_collected_in_result_order() {
    let log = CaptureLog::default();
    let (cameras, leases) = mixed_rig(2, &log);
    let mapper = SerialMapper {
        fail_on: Some("cam-3".to_string()),
        panic_on: Some("cam-1".to_string()),
        ..Default::default()
    };

    let err = CaptureScheduler::new(2, 1).run(&cameras, &mapper).unwrap_err();

    let failed: Vec<&str> = err.failures().iter().map(|f| f.serial.as_str()).collect();
    assert_eq!(failed, vec!["cam-1", "cam-3"]);
    assert!(matches!(&err.first().error, TaskError::Panicked(msg) if msg.contains("cam-1")));
    assert_eq!(mapper.completed.load(Ordering::SeqCst), 2);
    assert!(leases.iter().all(|l| l.outstanding() == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_settle_the_same_way_async() {
    let log = CaptureLog::default();
    let (mut cameras, leases) = mixed_rig(2, &log);
    cameras[3] = Camera::new(
        RecordingDevice::new("coded", CameraType::CodedLight, log.clone()).failing(),
        CameraType::CodedLight,
        3.0,
    );
    let mapper = Arc::new(SerialMapper {
        panic_on: Some("cam-0".to_string()),
        ..Default::default()
    });

    let err = CaptureScheduler::new(2, 0)
        .run_async(&cameras, Arc::clone(&mapper))
        .await
        .unwrap_err();

    let failed: Vec<&str> = err.failures().iter().map(|f| f.serial.as_str()).collect();
    assert_eq!(failed, vec!["cam-0", "coded"]);
    assert_eq!(mapper.completed.load(Ordering::SeqCst), 2);
    assert_exclusive_isolation(&log.lock());
    assert!(leases.iter().all(|l| l.outstanding() == 0));
}
