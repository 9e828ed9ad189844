//! Plain-text XYZ point clouds: one `x y z` triple per line.

mod loader;
mod writer;

pub use loader::{XyzError, load_xyz, parse_xyz};
pub use writer::{XyzWriter, write_xyz};
