//! The scan orchestrator.
//!
//! [`ScanManager`] owns the rig's cameras and session settings and exposes
//! the three things a caller does with a rig: scan an object, calibrate the
//! cameras, and save a cloud.

use crate::calibration::{CalibrationMapper, CameraDeviation};
use crate::error::{AggregateTaskError, ScanError};
use crate::fusion::{ScanMapper, merge_point_clouds};
use crate::scheduler::{CaptureScheduler, FrameMapper, Partition};
use crate::session::ScanSession;
use polyscan_capture::Camera;
use polyscan_data::{CalibrationSurface, FormatRegistry, PointCloud};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug)]
pub struct ScanManager {
    pub cameras: Vec<Camera>,
    pub session: ScanSession,
    pub calibration_surface: CalibrationSurface,
    formats: FormatRegistry,
}

impl ScanManager {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            cameras,
            session: ScanSession::default(),
            calibration_surface: CalibrationSurface::default(),
            formats: FormatRegistry::default(),
        }
    }

    pub fn with_session(mut self, session: ScanSession) -> Self {
        self.session = session;
        self
    }

    pub fn with_calibration_surface(mut self, surface: CalibrationSurface) -> Self {
        self.calibration_surface = surface;
        self
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Register extra output formats here.
    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    fn scheduler(&self) -> CaptureScheduler {
        CaptureScheduler::from_session(&self.session)
    }

    /// Capture every enabled camera and run `mapper` over its frames.
    /// Results are in concurrent-then-exclusive enumeration order.
    pub fn scan_to_mapper<M: FrameMapper>(&self, mapper: &M) -> Result<Vec<M::Output>, AggregateTaskError> {
        self.scheduler().run(&self.cameras, mapper)
    }

    pub async fn scan_to_mapper_async<M>(&self, mapper: Arc<M>) -> Result<Vec<M::Output>, AggregateTaskError>
    where
        M: FrameMapper + 'static,
        M::Output: 'static,
    {
        self.scheduler().run_async(&self.cameras, mapper).await
    }

    /// Scan and fuse everything the enabled cameras see into one cloud.
    #[instrument(skip(self), fields(cameras = self.cameras.len()))]
    pub fn scan_object(&self) -> Result<PointCloud, ScanError> {
        let clouds = self.scan_to_mapper(&ScanMapper)?;
        let merged = merge_point_clouds(clouds, self.session.debug);
        info!("Fused scan has {} points", merged.len());
        Ok(merged)
    }

    pub async fn scan_object_async(&self) -> Result<PointCloud, ScanError> {
        let clouds = self.scan_to_mapper_async(Arc::new(ScanMapper)).await?;
        let merged = merge_point_clouds(clouds, self.session.debug);
        info!("Fused scan has {} points", merged.len());
        Ok(merged)
    }

    /// Measure every enabled camera against the calibration surface and
    /// store the resulting deviations. Nothing is changed unless every
    /// camera succeeds.
    #[instrument(skip(self), fields(distance = self.calibration_surface.distance))]
    pub fn calibrate(&mut self) -> Result<Vec<CameraDeviation>, ScanError> {
        let mapper = CalibrationMapper::new(self.calibration_surface);
        let deviations = self.scan_to_mapper(&mapper)?;
        self.apply_deviations(&deviations);
        Ok(deviations)
    }

    pub async fn calibrate_async(&mut self) -> Result<Vec<CameraDeviation>, ScanError> {
        let mapper = Arc::new(CalibrationMapper::new(self.calibration_surface));
        let deviations = self.scan_to_mapper_async(mapper).await?;
        self.apply_deviations(&deviations);
        Ok(deviations)
    }

    fn apply_deviations(&mut self, deviations: &[CameraDeviation]) {
        let order: Vec<usize> = Partition::of(&self.cameras).result_order().collect();
        for (i, measured) in order.into_iter().zip(deviations) {
            let camera = &mut self.cameras[i];
            info!(
                "Camera {} position deviation {:?} -> {:?}",
                camera.serial(),
                camera.position_deviation(),
                measured.deviation
            );
            camera.set_position_deviation(measured.deviation);
        }
    }

    /// Save under the session filename, with the format's extension appended.
    pub fn save_point_cloud(&self, cloud: &PointCloud, format: &str) -> Result<PathBuf, ScanError> {
        Ok(self.formats.save(cloud, &self.session.filename, format)?)
    }

    pub async fn save_point_cloud_async(&self, cloud: &PointCloud, format: &str) -> Result<PathBuf, ScanError> {
        Ok(self.formats.save_async(cloud, &self.session.filename, format).await?)
    }
}
