//! Writing finished point clouds to disk.
//!
//! Formats are looked up by identifier in a [`FormatRegistry`]. The registry
//! resolves the writer before touching the filesystem, so an unknown format
//! never leaves a file behind. Writes go to a temporary file next to the
//! target and are renamed into place once the whole payload is on disk.

use crate::types::PointCloud;
use crate::xyz::XyzWriter;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while persisting a point cloud.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("The format {0} is not supported")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to move temporary file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// A serializer for one output format.
pub trait PointCloudWriter: Send + Sync {
    /// Identifier callers select the format by (e.g. `"xyz"`).
    fn format(&self) -> &str;

    /// File extension appended to the base filename. Defaults to the format.
    fn extension(&self) -> &str {
        self.format()
    }

    /// Serialize the full cloud into `out`.
    fn encode(&self, cloud: &PointCloud, out: &mut dyn Write) -> io::Result<()>;
}

/// Output formats available for saving scans.
pub struct FormatRegistry {
    writers: BTreeMap<String, Box<dyn PointCloudWriter>>,
}

impl FormatRegistry {
    /// A registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            writers: BTreeMap::new(),
        }
    }

    /// Register a writer, returning the one it replaced if the format was
    /// already known.
    pub fn register(&mut self, writer: Box<dyn PointCloudWriter>) -> Option<Box<dyn PointCloudWriter>> {
        let format = writer.format().to_string();
        debug!("Registering point cloud format '{}'", format);
        self.writers.insert(format, writer)
    }

    /// Look up the writer for `format`.
    pub fn get(&self, format: &str) -> Result<&dyn PointCloudWriter, PersistError> {
        self.writers
            .get(format)
            .map(|w| w.as_ref())
            .ok_or_else(|| PersistError::UnsupportedFormat(format.to_string()))
    }

    pub fn contains(&self, format: &str) -> bool {
        self.writers.contains_key(format)
    }

    /// Registered format identifiers, sorted.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.writers.keys().map(String::as_str)
    }

    /// The file a save of `format` under `base` would produce.
    pub fn output_path(&self, base: impl AsRef<Path>, format: &str) -> Result<PathBuf, PersistError> {
        let writer = self.get(format)?;
        Ok(with_extension_appended(base.as_ref(), writer.extension()))
    }

    /// Save `cloud` as `<base>.<extension>` in the requested format.
    #[tracing::instrument(skip_all, fields(base = %base.as_ref().display(), format = %format))]
    pub fn save(&self, cloud: &PointCloud, base: impl AsRef<Path>, format: &str) -> Result<PathBuf, PersistError> {
        let (path, payload) = self.prepare(cloud, base.as_ref(), format)?;
        write_atomic(&path, &payload)?;
        info!("Saved {} points to {}", cloud.len(), path.display());
        Ok(path)
    }

    /// Async counterpart of [`save`](Self::save). Encoding happens on the
    /// caller, the file write on tokio's blocking pool.
    pub async fn save_async(
        &self,
        cloud: &PointCloud,
        base: impl AsRef<Path>,
        format: &str,
    ) -> Result<PathBuf, PersistError> {
        let (path, payload) = self.prepare(cloud, base.as_ref(), format)?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &payload))
            .await
            .map_err(io::Error::other)??;
        info!("Saved {} points to {}", cloud.len(), path.display());
        Ok(path)
    }

    fn prepare(&self, cloud: &PointCloud, base: &Path, format: &str) -> Result<(PathBuf, Vec<u8>), PersistError> {
        let writer = self.get(format)?;
        let path = with_extension_appended(base, writer.extension());
        let mut payload = Vec::new();
        writer.encode(cloud, &mut payload)?;
        Ok((path, payload))
    }
}

impl Default for FormatRegistry {
    /// Only the `"xyz"` writer is built in.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(XyzWriter));
        registry
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.writers.keys()).finish()
    }
}

// "scan.v2" + "xyz" -> "scan.v2.xyz"; Path::with_extension would drop ".v2".
fn with_extension_appended(base: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
