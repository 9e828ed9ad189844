//! Parameters of one scan or calibration run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Held fixed for the duration of one scan or calibration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSession {
    /// Frames kept from each camera per capture.
    pub frames_number: usize,
    /// Warm-up frames captured and thrown away before the kept ones.
    pub dummy_frames_number: usize,
    /// Base name of the output file; the format adds the extension.
    pub filename: PathBuf,
    /// Log per-camera fusion details at info level.
    pub debug: bool,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            frames_number: 15,
            dummy_frames_number: 30,
            filename: PathBuf::from("default"),
            debug: false,
        }
    }
}
