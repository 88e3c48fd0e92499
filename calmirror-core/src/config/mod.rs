//! calmirror configuration.
//!
//! Loaded from a TOML file (default `~/.config/calmirror/config.toml`),
//! optionally extended by an inline JSON document.

mod scope;

pub use scope::{FollowScope, MirrorScope, SourceSpec};
pub(crate) use scope::effective_mask;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::error::{MirrorError, MirrorResult};

pub const DEFAULT_CONCURRENCY: usize = 10;

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Upper bound on concurrently in-flight writes
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<String>,

    /// Where follow watermarks are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,

    #[serde(default, rename = "mirror")]
    pub mirrors: Vec<MirrorScope>,

    #[serde(default, rename = "follow")]
    pub follows: Vec<FollowScope>,
}

impl MirrorConfig {
    pub fn config_path() -> MirrorResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MirrorError::Config("Could not determine config directory".into()))?
            .join("calmirror");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, layering `inline_json` on top when given.
    ///
    /// The file is optional only when inline JSON is present.
    pub fn load(path: &Path, inline_json: Option<&str>) -> MirrorResult<Self> {
        let path = shellexpand::tilde(&path.to_string_lossy()).into_owned();

        let mut builder = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(inline_json.is_none()));

        if let Some(json) = inline_json {
            builder = builder.add_source(File::from_str(json, FileFormat::Json));
        }

        let config: MirrorConfig = builder
            .build()
            .map_err(|e| MirrorError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| MirrorError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> MirrorResult<Self> {
        let config: MirrorConfig =
            toml::from_str(content).map_err(|e| MirrorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MirrorResult<()> {
        if self.concurrency == 0 {
            return Err(MirrorError::Config("concurrency must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        let ids = self
            .mirrors
            .iter()
            .map(|m| (&m.id, &m.target_calendar_id))
            .chain(self.follows.iter().map(|f| (&f.id, &f.target_calendar_id)));

        for (id, target) in ids {
            if id.is_empty() {
                return Err(MirrorError::Config("scope id must not be empty".into()));
            }
            if !seen.insert(id.as_str()) {
                return Err(MirrorError::Config(format!("duplicate scope id '{id}'")));
            }
            if target.is_empty() {
                return Err(MirrorError::Config(format!(
                    "scope '{id}' has an empty target_calendar_id"
                )));
            }
        }

        for mirror in &self.mirrors {
            if mirror.source_calendars.is_empty() {
                return Err(MirrorError::Config(format!(
                    "mirror '{}' has no source_calendars",
                    mirror.id
                )));
            }
            if let Some(source) = mirror.source_calendars.iter().find(|s| s.id.is_empty()) {
                return Err(MirrorError::Config(format!(
                    "mirror '{}' has a source with an empty id (prefix {:?})",
                    mirror.id, source.prefix
                )));
            }
        }

        for follow in &self.follows {
            if follow.source_calendar_id.is_empty() {
                return Err(MirrorError::Config(format!(
                    "follow '{}' has an empty source_calendar_id",
                    follow.id
                )));
            }
        }

        self.date_range()?;
        Ok(())
    }

    pub fn date_range(&self) -> MirrorResult<DateRange> {
        DateRange::from_args(self.time_min.as_deref(), self.time_max.as_deref())
            .map_err(MirrorError::Config)
    }

    /// Watermark file, defaulting to `~/.local/share/calmirror/status.toml`.
    pub fn status_path(&self) -> MirrorResult<PathBuf> {
        match &self.status_file {
            Some(path) => Ok(PathBuf::from(
                shellexpand::tilde(&path.to_string_lossy()).into_owned(),
            )),
            None => Ok(dirs::data_local_dir()
                .ok_or_else(|| MirrorError::Config("Could not determine data directory".into()))?
                .join("calmirror")
                .join("status.toml")),
        }
    }

    pub fn mirror(&self, id: &str) -> MirrorResult<&MirrorScope> {
        self.mirrors.iter().find(|m| m.id == id).ok_or_else(|| {
            let available: Vec<_> = self.mirrors.iter().map(|m| m.id.as_str()).collect();
            MirrorError::Config(format!(
                "mirror scope '{}' not found. Available: {}",
                id,
                available.join(", ")
            ))
        })
    }

    pub fn follow(&self, id: &str) -> MirrorResult<&FollowScope> {
        self.follows.iter().find(|f| f.id == id).ok_or_else(|| {
            let available: Vec<_> = self.follows.iter().map(|f| f.id.as_str()).collect();
            MirrorError::Config(format!(
                "follow scope '{}' not found. Available: {}",
                id,
                available.join(", ")
            ))
        })
    }
}
