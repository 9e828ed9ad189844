//! Rig configuration file.
//!
//! A single JSON document describes the cameras, the scan session and the
//! calibration surface. Calibration writes the measured deviations back
//! into the same file.

use glam::Vec3;
use polyscan_capture::{Camera, CameraType, PinholeIntrinsics, SyntheticDevice, SyntheticScene};
use polyscan_core::ScanSession;
use polyscan_data::CalibrationSurface;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera {0} has a non-positive field of view")]
    InvalidFieldOfView(String),

    #[error("Duplicate camera serial {0}")]
    DuplicateSerial(String),
}

/// One camera entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub serial: String,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    #[serde(default = "enabled")]
    pub on: bool,
    /// Azimuth around the object, radians.
    pub angle: f32,
    /// Horizontal field of view in radians. Defaults to the type's nominal one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f32>,
    #[serde(default)]
    pub position_deviation: Vec3,
    /// Simulated rig only: how far the camera really sits from its nominal
    /// mount.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mount_offset: Vec3,
}

fn enabled() -> bool {
    true
}

fn is_zero(v: &Vec3) -> bool {
    *v == Vec3::ZERO
}

/// The object the simulated cameras look at during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub object_center: Vec3,
    pub object_radius: f32,
    pub resolution: [u32; 2],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            object_center: Vec3::new(0.0, 0.0, 0.6),
            object_radius: 0.15,
            resolution: [64, 48],
        }
    }
}

/// Which scene the simulated rig renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigMode {
    Scan,
    Calibrate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    pub cameras: Vec<CameraConfig>,
    #[serde(flatten)]
    pub session: ScanSession,
    #[serde(default)]
    pub calibration_surface: CalibrationSurface,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl RigConfig {
    /// Evenly spaced ring: stereo cameras plus one of each exclusive type.
    pub fn example() -> Self {
        let types = [
            CameraType::StereoDepth,
            CameraType::StereoDepth,
            CameraType::Lidar,
            CameraType::StereoDepth,
            CameraType::CodedLight,
        ];
        let cameras = types
            .iter()
            .enumerate()
            .map(|(i, &camera_type)| CameraConfig {
                serial: format!("sim-{i}"),
                camera_type,
                on: true,
                angle: i as f32 * TAU / types.len() as f32,
                field_of_view: None,
                position_deviation: Vec3::ZERO,
                mount_offset: Vec3::ZERO,
            })
            .collect();

        Self {
            cameras,
            session: ScanSession::default(),
            calibration_surface: CalibrationSurface::new(0.3, 0.2, 0.5),
            simulation: SimulationConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        debug!("Loaded {} cameras from {}", config.cameras.len(), path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, camera) in self.cameras.iter().enumerate() {
            if camera.field_of_view.is_some_and(|fov| fov <= 0.0) {
                return Err(ConfigError::InvalidFieldOfView(camera.serial.clone()));
            }
            if self.cameras[..i].iter().any(|c| c.serial == camera.serial) {
                return Err(ConfigError::DuplicateSerial(camera.serial.clone()));
            }
        }
        Ok(())
    }

    /// Build the simulated rig, in config order.
    pub fn build_cameras(&self, mode: RigMode) -> Vec<Camera> {
        let scene = match mode {
            RigMode::Scan => SyntheticScene::Sphere {
                center: self.simulation.object_center,
                radius: self.simulation.object_radius,
            },
            RigMode::Calibrate => SyntheticScene::calibration(&self.calibration_surface),
        };
        let [width, height] = self.simulation.resolution;

        self.cameras
            .iter()
            .map(|c| {
                let fov = c.field_of_view.unwrap_or(c.camera_type.default_field_of_view());
                let device = SyntheticDevice::new(c.serial.clone(), scene)
                    .with_camera_type(c.camera_type)
                    .with_intrinsics(PinholeIntrinsics::from_fov(width, height, fov))
                    .with_mount_offset(c.mount_offset);
                Camera::new(device, c.camera_type, c.angle)
                    .with_field_of_view(fov)
                    .with_position_deviation(c.position_deviation)
                    .with_enabled(c.on)
            })
            .collect()
    }

    /// Copy calibrated deviations back from cameras built by
    /// [`build_cameras`](Self::build_cameras).
    pub fn store_deviations(&mut self, cameras: &[Camera]) {
        for (config, camera) in self.cameras.iter_mut().zip(cameras) {
            config.position_deviation = camera.position_deviation();
        }
    }
}
