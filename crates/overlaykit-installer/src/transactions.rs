use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use overlaykit_core::InstalledVersionRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backup::BackupSnapshot;
use crate::fs_utils::{create_parent_dir, partial_copy_path, remove_dir_if_exists};
use crate::version_store::VersionStore;
use crate::{InstallError, InstallLayout};

/// On-disk record of an install attempt that has not finished yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInstall {
    pub attempt_id: String,
    pub status: AttemptStatus,
    pub base_tag: String,
    pub overlay_tag: String,
    pub started_at_millis: i64,
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
    /// Record on disk before the attempt; written back when an applying
    /// attempt is recovered, since the new one may already be saved.
    #[serde(default)]
    pub previous_record: Option<InstalledVersionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Snapshots may be on disk; recovery restores them.
    Applying,
    /// The new record is persisted; recovery discards the snapshots.
    Committing,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applying => "applying",
            Self::Committing => "committing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub dir: PathBuf,
    pub backup_dir: PathBuf,
    pub dir_existed: bool,
    pub created_original: Option<PathBuf>,
}

impl SnapshotRecord {
    fn resume(&self) -> BackupSnapshot {
        BackupSnapshot::resume(
            self.dir.clone(),
            self.backup_dir.clone(),
            self.dir_existed,
            self.created_original.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Clean,
    RolledBack(ActiveInstall),
    Completed(ActiveInstall),
}

/// Writes the marker, refusing if another attempt already owns it.
pub fn claim_active_install(
    layout: &InstallLayout,
    attempt: &ActiveInstall,
) -> Result<PathBuf, InstallError> {
    let path = layout.transaction_active_path();
    create_parent_dir(&path)?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let attempt_id = read_active_install(layout)
                .ok()
                .flatten()
                .map(|existing| existing.attempt_id)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(InstallError::TransactionInProgress { attempt_id });
        }
        Err(err) => return Err(InstallError::io(&path, "claim install marker", err)),
    };

    file.write_all(&encode(&path, attempt)?)
        .and_then(|()| file.flush())
        .map_err(|err| InstallError::io(&path, "write install marker", err))?;
    Ok(path)
}

pub fn write_active_install(
    layout: &InstallLayout,
    attempt: &ActiveInstall,
) -> Result<(), InstallError> {
    let path = layout.transaction_active_path();
    fs::write(&path, encode(&path, attempt)?)
        .map_err(|err| InstallError::io(&path, "write install marker", err))
}

pub fn read_active_install(layout: &InstallLayout) -> Result<Option<ActiveInstall>, InstallError> {
    let path = layout.transaction_active_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(InstallError::io(&path, "read install marker", err)),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| InstallError::Persist { path, source })
}

pub fn clear_active_install(layout: &InstallLayout) -> Result<(), InstallError> {
    let path = layout.transaction_active_path();
    crate::fs_utils::remove_file_if_exists(&path)
        .map_err(|err| InstallError::io(&path, "clear install marker", err))
}

/// Finishes an attempt that was cut short: restores its snapshots and the
/// previous version record while it was still applying, or discards the
/// snapshots once it reached committing.
pub fn recover_interrupted_install(
    layout: &InstallLayout,
) -> Result<RecoveryOutcome, InstallError> {
    let Some(attempt) = read_active_install(layout)? else {
        return Ok(RecoveryOutcome::Clean);
    };
    info!(
        attempt = %attempt.attempt_id,
        status = attempt.status.as_str(),
        "recovering interrupted install"
    );

    match attempt.status {
        AttemptStatus::Applying => {
            for record in attempt.snapshots.iter().rev() {
                record.resume().rollback()?;
            }
            if let Some(previous) = &attempt.previous_record {
                let store = VersionStore::new(layout.version_file());
                if store.load().ok().as_ref() != Some(previous) {
                    warn!(
                        path = %store.path().display(),
                        "restoring version record of interrupted install"
                    );
                    store.save(previous)?;
                }
            }
        }
        AttemptStatus::Committing => {
            for record in &attempt.snapshots {
                record.resume().commit();
            }
        }
    }

    for original in attempt
        .snapshots
        .iter()
        .filter_map(|record| record.created_original.as_deref())
    {
        let partial = partial_copy_path(original);
        if partial.exists() {
            info!(path = %partial.display(), "removing interrupted pristine copy");
            remove_dir_if_exists(&partial)?;
        }
    }
    discard_staging(&attempt.staging_dir);
    clear_active_install(layout)?;

    Ok(match attempt.status {
        AttemptStatus::Applying => RecoveryOutcome::RolledBack(attempt),
        AttemptStatus::Committing => RecoveryOutcome::Completed(attempt),
    })
}

pub(crate) fn discard_staging(staging_dir: &Path) {
    if let Err(err) = remove_dir_if_exists(staging_dir) {
        warn!(
            staging = %staging_dir.display(),
            error = %err,
            "failed to remove staging directory"
        );
    }
}

fn encode(path: &Path, attempt: &ActiveInstall) -> Result<Vec<u8>, InstallError> {
    let mut payload =
        serde_json::to_vec_pretty(attempt).map_err(|source| InstallError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
    payload.push(b'\n');
    Ok(payload)
}
