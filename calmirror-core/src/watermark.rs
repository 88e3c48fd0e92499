//! Per-scope follow watermarks.
//!
//! A watermark is the opaque token the source service returned at the end of
//! the last successful listing. Scopes without one get a full listing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{MirrorError, MirrorResult};

/// Scope id -> watermark.
pub type Watermarks = BTreeMap<String, String>;

pub trait WatermarkStore: Send + Sync {
    fn load(&self) -> MirrorResult<Watermarks>;
    fn save(&self, watermarks: &Watermarks) -> MirrorResult<()>;
}

/// Watermarks kept as a flat TOML key/value file.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileWatermarkStore { path: path.into() }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> MirrorResult<Watermarks> {
        if !self.path.exists() {
            return Ok(Watermarks::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            MirrorError::Status(format!("Could not parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, watermarks: &Watermarks) -> MirrorResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string(watermarks)
            .map_err(|e| MirrorError::Status(format!("Could not serialize watermarks: {e}")))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
