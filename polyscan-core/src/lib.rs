//! Polyscan Core
//!
//! Orchestrates a ring of depth cameras around an object: schedules their
//! captures so interfering emitters never overlap, fuses the per-camera
//! clouds into one, and calibrates per-camera mounting offsets.
//!
//! ## Modules
//!
//! - [`latch`]: countdown latch separating "captured" from "processed"
//! - [`scheduler`]: concurrent/exclusive capture scheduling, sync and async
//! - [`fusion`]: angular clipping and concatenation of per-camera clouds
//! - [`calibration`]: centroid-based position deviation
//! - [`manager`]: the [`ScanManager`] tying it all together

pub mod calibration;
pub mod error;
pub mod fusion;
pub mod latch;
pub mod manager;
pub mod scheduler;
pub mod session;

pub use calibration::{CalibrationMapper, CameraDeviation, deviation_from_centroid};
pub use error::{AggregateTaskError, CameraFailure, ScanError, TaskError};
pub use fusion::{CameraCloud, ScanMapper, SectorBounds, merge_point_clouds};
pub use latch::CountdownLatch;
pub use manager::ScanManager;
pub use scheduler::{CaptureScheduler, FrameMapper, Partition};
pub use session::ScanSession;
