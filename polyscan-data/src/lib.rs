//! Polyscan Data Crate
//!
//! Point cloud types and output formats shared by the polyscan capture and
//! fusion crates. Nothing here knows about cameras or hardware.
//!
//! ## Modules
//!
//! - [`types`]: points, point clouds and the calibration reference surface
//! - [`persist`]: the format registry used to write finished scans to disk
//! - [`xyz`]: the built-in plain-text `x y z` format

pub mod persist;
pub mod types;
pub mod xyz;

pub use persist::{FormatRegistry, PersistError, PointCloudWriter};
pub use types::{CalibrationSurface, Point, PointCloud};
pub use xyz::{XyzError, XyzWriter, load_xyz};
