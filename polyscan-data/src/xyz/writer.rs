//! XYZ encoding

use crate::persist::PointCloudWriter;
use crate::types::PointCloud;
use std::io::{self, Write};

/// Write `cloud` as whitespace-separated `x y z` lines, each newline-terminated.
pub fn write_xyz<W: Write + ?Sized>(cloud: &PointCloud, out: &mut W) -> io::Result<()> {
    for p in cloud {
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// The built-in `"xyz"` output format.
#[derive(Debug, Default, Clone, Copy)]
pub struct XyzWriter;

impl PointCloudWriter for XyzWriter {
    fn format(&self) -> &str {
        "xyz"
    }

    fn encode(&self, cloud: &PointCloud, out: &mut dyn Write) -> io::Result<()> {
        write_xyz(cloud, out)
    }
}
