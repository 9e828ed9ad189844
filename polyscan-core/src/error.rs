//! Error types for scans and calibrations.

use polyscan_capture::CaptureError;
use polyscan_data::PersistError;
use std::fmt;
use thiserror::Error;

/// Why a single camera's task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Reference scan produced no points")]
    EmptyReference,

    #[error("Camera task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked(message)
    }

    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        match err.try_into_panic() {
            Ok(payload) => Self::from_panic(payload),
            Err(err) => TaskError::Panicked(err.to_string()),
        }
    }
}

/// A task failure attributed to its camera.
#[derive(Debug, Error)]
#[error("Camera {serial} failed: {error}")]
pub struct CameraFailure {
    pub serial: String,
    #[source]
    pub error: TaskError,
}

/// One or more camera tasks failed. Every task had settled before this was
/// produced; the first failure in result order is the primary cause.
#[derive(Debug)]
pub struct AggregateTaskError {
    failures: Vec<CameraFailure>,
    total: usize,
}

impl AggregateTaskError {
    /// `failures` must not be empty.
    pub(crate) fn new(failures: Vec<CameraFailure>, total: usize) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures, total }
    }

    /// The primary cause.
    pub fn first(&self) -> &CameraFailure {
        &self.failures[0]
    }

    /// Every failure, in result order.
    pub fn failures(&self) -> &[CameraFailure] {
        &self.failures
    }

    /// Number of tasks that ran, failed or not.
    pub fn total_tasks(&self) -> usize {
        self.total
    }
}

impl fmt::Display for AggregateTaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} camera tasks failed; first: {}",
            self.failures.len(),
            self.total,
            self.first()
        )
    }
}

impl std::error::Error for AggregateTaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.first())
    }
}

/// Errors surfaced by [`ScanManager`](crate::ScanManager).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Tasks(#[from] AggregateTaskError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
