use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use overlaykit_core::{InstalledVersionRecord, VersionDescriptor};
use tracing::info;

use crate::fs_utils::create_parent_dir;
use crate::InstallError;

/// Durable home of the [`InstalledVersionRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<InstalledVersionRecord, InstallError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(InstalledVersionRecord::default());
            }
            Err(err) => return Err(InstallError::io(&self.path, "read", err)),
        };
        if raw.trim().is_empty() {
            return Ok(InstalledVersionRecord::default());
        }

        serde_json::from_str(&raw).map_err(|source| InstallError::Persist {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the file wholesale through a sibling temp file.
    pub fn save(&self, record: &InstalledVersionRecord) -> Result<(), InstallError> {
        let mut payload =
            serde_json::to_string_pretty(record).map_err(|source| InstallError::Persist {
                path: self.path.clone(),
                source,
            })?;
        payload.push('\n');

        create_parent_dir(&self.path)?;
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, payload.as_bytes()).map_err(|err| InstallError::io(&tmp, "write", err))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            InstallError::io(&self.path, "replace", err)
        })?;

        info!(path = %self.path.display(), "version record saved");
        Ok(())
    }

    pub fn update_cache_dir(
        &self,
        cache_dir: &Path,
    ) -> Result<InstalledVersionRecord, InstallError> {
        let mut record = self.load()?;
        record.cache_dir = cache_dir.display().to_string();
        self.save(&record)?;
        Ok(record)
    }
}

/// The record a successful install of `descriptor` leaves behind.
pub fn record_for_install(
    descriptor: &VersionDescriptor,
    cache_dir: &Path,
) -> InstalledVersionRecord {
    InstalledVersionRecord {
        base_tag: descriptor.base.tag.clone(),
        overlay_tag: descriptor.overlay.tag.clone(),
        install_time_text: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        install_timestamp_millis: Utc::now().timestamp_millis(),
        cache_dir: cache_dir.display().to_string(),
    }
}
