//! Runtime settings in a JSON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use coinlink_core::{Settings, SettingsStore};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StorageResult;

/// [`SettingsStore`] backed by one JSON document.
///
/// Loading never fails on content: a missing file yields defaults, an
/// unparsable one yields defaults with a warning, and individual malformed
/// keys are dropped by [`Settings::overlay`]. Saving writes a sibling
/// temporary file and renames it over the original.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<Option<Value>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, settings: &Settings) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(settings)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> coinlink_core::Result<Settings> {
        let settings = match self.read_document() {
            Ok(Some(document)) => Settings::default().overlay(&document),
            Ok(None) => {
                info!(path = %self.path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        };
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> coinlink_core::Result<()> {
        self.write_document(settings)?;
        Ok(())
    }
}
