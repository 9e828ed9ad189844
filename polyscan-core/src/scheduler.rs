//! Capture scheduling across interfering camera technologies.
//!
//! Stereo-depth cameras can capture side by side; LiDAR and coded-light
//! emitters blind every other sensor and must capture alone. A scan
//! therefore runs in two phases:
//!
//! 1. Every enabled stereo camera captures in its own task and counts down a
//!    shared [`CountdownLatch`] as soon as its frames are in, then carries on
//!    mapping them.
//! 2. Once the latch opens, exclusive cameras capture one after another on
//!    the calling path, each handing its frames to a fresh mapping task.
//!
//! All tasks are awaited before anything is reported. Results come back in
//! concurrent-then-exclusive enumeration order, not azimuth order.

use crate::error::{AggregateTaskError, CameraFailure, TaskError};
use crate::latch::{CountdownLatch, SignalOnDrop};
use crate::session::ScanSession;
use polyscan_capture::{Camera, DepthFrame};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Turns one camera's captured frames into a result.
///
/// The mapper owns the frames it is given and should drop them as soon as
/// it no longer needs them.
pub trait FrameMapper: Send + Sync {
    type Output: Send;

    fn map(&self, camera: &Camera, frames: Vec<DepthFrame>) -> Result<Self::Output, TaskError>;
}

/// Indices of enabled cameras, split by scheduling class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub concurrent: Vec<usize>,
    pub exclusive: Vec<usize>,
}

impl Partition {
    /// Split the enabled cameras, keeping enumeration order within a class.
    pub fn of(cameras: &[Camera]) -> Self {
        let mut partition = Self::default();
        for (i, camera) in cameras.iter().enumerate().filter(|(_, c)| c.is_on()) {
            if camera.camera_type().is_exclusive() {
                partition.exclusive.push(i);
            } else {
                partition.concurrent.push(i);
            }
        }
        partition
    }

    pub fn len(&self) -> usize {
        self.concurrent.len() + self.exclusive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Camera indices in the order results are returned.
    pub fn result_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.concurrent.iter().chain(self.exclusive.iter()).copied()
    }
}

enum Pending<H> {
    Running(H),
    Failed(TaskError),
}

/// Runs a [`FrameMapper`] over every enabled camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureScheduler {
    frames_number: usize,
    dummy_frames_number: usize,
}

impl CaptureScheduler {
    pub fn new(frames_number: usize, dummy_frames_number: usize) -> Self {
        Self {
            frames_number,
            dummy_frames_number,
        }
    }

    pub fn from_session(session: &ScanSession) -> Self {
        Self::new(session.frames_number, session.dummy_frames_number)
    }

    fn capture(&self, camera: &Camera) -> Result<Vec<DepthFrame>, TaskError> {
        Ok(camera.capture_frames(self.frames_number, self.dummy_frames_number)?)
    }

    /// Blocking variant. Concurrent cameras run on scoped threads; the
    /// calling thread waits on the latch and then drives exclusive captures.
    pub fn run<M: FrameMapper>(
        &self,
        cameras: &[Camera],
        mapper: &M,
    ) -> Result<Vec<M::Output>, AggregateTaskError> {
        let partition = Partition::of(cameras);
        info!(
            "Scanning with {} concurrent and {} exclusive cameras",
            partition.concurrent.len(),
            partition.exclusive.len()
        );
        if partition.is_empty() {
            return Ok(Vec::new());
        }

        let latch = CountdownLatch::new(partition.concurrent.len());

        let outcomes = thread::scope(|s| {
            let mut tasks = Vec::with_capacity(partition.len());

            for &i in &partition.concurrent {
                let camera = &cameras[i];
                let latch = &latch;
                let handle = s.spawn(move || {
                    let signal = SignalOnDrop(latch);
                    let frames = self.capture(camera);
                    drop(signal);
                    mapper.map(camera, frames?)
                });
                tasks.push((i, Pending::Running(handle)));
            }

            latch.wait();
            debug!("Concurrent captures finished");

            for &i in &partition.exclusive {
                let camera = &cameras[i];
                let captured = catch_unwind(AssertUnwindSafe(|| self.capture(camera)))
                    .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
                match captured {
                    Ok(frames) => {
                        let handle = s.spawn(move || mapper.map(camera, frames));
                        tasks.push((i, Pending::Running(handle)));
                    }
                    Err(err) => tasks.push((i, Pending::Failed(err))),
                }
            }

            tasks
                .into_iter()
                .map(|(i, task)| {
                    let outcome = match task {
                        Pending::Running(handle) => handle
                            .join()
                            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload))),
                        Pending::Failed(err) => Err(err),
                    };
                    (i, outcome)
                })
                .collect::<Vec<_>>()
        });

        settle(cameras, outcomes)
    }

    /// Async variant with the same ordering and failure behaviour. Device
    /// work runs on tokio's blocking pool; the caller yields while waiting
    /// on the latch and on each exclusive capture.
    pub async fn run_async<M>(
        &self,
        cameras: &[Camera],
        mapper: Arc<M>,
    ) -> Result<Vec<M::Output>, AggregateTaskError>
    where
        M: FrameMapper + 'static,
        M::Output: 'static,
    {
        let partition = Partition::of(cameras);
        info!(
            "Scanning with {} concurrent and {} exclusive cameras",
            partition.concurrent.len(),
            partition.exclusive.len()
        );
        if partition.is_empty() {
            return Ok(Vec::new());
        }

        let latch = Arc::new(CountdownLatch::new(partition.concurrent.len()));
        let scheduler = *self;
        let mut tasks = Vec::with_capacity(partition.len());

        for &i in &partition.concurrent {
            let camera = cameras[i].clone();
            let latch = Arc::clone(&latch);
            let mapper = Arc::clone(&mapper);
            let handle = tokio::task::spawn_blocking(move || {
                let signal = SignalOnDrop(latch);
                let frames = scheduler.capture(&camera);
                drop(signal);
                mapper.map(&camera, frames?)
            });
            tasks.push((i, Pending::Running(handle)));
        }

        latch.wait_async().await;
        debug!("Concurrent captures finished");

        for &i in &partition.exclusive {
            let camera = cameras[i].clone();
            let capturing = camera.clone();
            let captured = tokio::task::spawn_blocking(move || scheduler.capture(&capturing))
                .await
                .unwrap_or_else(|err| Err(TaskError::from_join(err)));
            match captured {
                Ok(frames) => {
                    let mapper = Arc::clone(&mapper);
                    let handle = tokio::task::spawn_blocking(move || mapper.map(&camera, frames));
                    tasks.push((i, Pending::Running(handle)));
                }
                Err(err) => tasks.push((i, Pending::Failed(err))),
            }
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (i, task) in tasks {
            let outcome = match task {
                Pending::Running(handle) => handle
                    .await
                    .unwrap_or_else(|err| Err(TaskError::from_join(err))),
                Pending::Failed(err) => Err(err),
            };
            outcomes.push((i, outcome));
        }

        settle(cameras, outcomes)
    }
}

fn settle<T>(
    cameras: &[Camera],
    outcomes: Vec<(usize, Result<T, TaskError>)>,
) -> Result<Vec<T>, AggregateTaskError> {
    let total = outcomes.len();
    let mut results = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (i, outcome) in outcomes {
        match outcome {
            Ok(value) => results.push(value),
            Err(err) => {
                let serial = cameras[i].serial().to_string();
                error!("Camera {} task failed: {}", serial, err);
                failures.push(CameraFailure { serial, error: err });
            }
        }
    }

    if failures.is_empty() {
        Ok(results)
    } else {
        Err(AggregateTaskError::new(failures, total))
    }
}
