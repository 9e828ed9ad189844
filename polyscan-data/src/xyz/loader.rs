//! XYZ file loading

use crate::types::PointCloud;
use glam::Vec3;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while reading an XYZ file.
#[derive(Debug, Error)]
pub enum XyzError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Load an XYZ file written by [`XyzWriter`](super::XyzWriter) or any tool
/// emitting whitespace-separated triples. Blank lines are skipped; extra
/// columns after `z` are ignored.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_xyz(path: impl AsRef<Path>) -> Result<PointCloud, XyzError> {
    debug!("Loading XYZ points");
    let text = fs::read_to_string(path.as_ref())?;
    let cloud = parse_xyz(&text)?;
    info!("XYZ file parsed: {} points", cloud.len());
    Ok(cloud)
}

/// Parse XYZ text already in memory.
pub fn parse_xyz(text: &str) -> Result<PointCloud, XyzError> {
    let mut cloud = PointCloud::default();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else {
            continue;
        };

        let coord = |name: &str, field: Option<&str>| -> Result<f32, XyzError> {
            let field = field.ok_or_else(|| XyzError::Parse {
                line: line_no,
                message: format!("missing '{}'", name),
            })?;
            field.parse::<f32>().map_err(|e| XyzError::Parse {
                line: line_no,
                message: format!("bad '{}' value {:?}: {}", name, field, e),
            })
        };

        let x = coord("x", Some(first))?;
        let y = coord("y", fields.next())?;
        let z = coord("z", fields.next())?;
        cloud.points.push(Vec3::new(x, y, z));
    }

    Ok(cloud)
}
