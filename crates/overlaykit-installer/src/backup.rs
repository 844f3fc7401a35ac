use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::fs_utils::{copy_dir_atomic, move_dir, remove_dir_if_exists};
use crate::{InstallError, InstallLayout};

/// Identifier for one install attempt. Nanosecond resolution keeps two
/// attempts started within the same second apart; `BackupManager::plan`
/// additionally skips names that are already taken on disk.
pub fn new_attempt_id() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}-{:09}", elapsed.as_secs(), elapsed.subsec_nanos())
}

/// Snapshots one directory by renaming it aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupManager {
    dir: PathBuf,
    original_dir: Option<PathBuf>,
    naming: SnapshotNaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SnapshotNaming {
    Target,
    Overlay,
}

impl BackupManager {
    /// Manager for the host target directory; the first backup also preserves
    /// the pristine tree in the original-backup slot.
    pub fn for_target(layout: &InstallLayout) -> Self {
        Self {
            dir: layout.target_dir(),
            original_dir: Some(layout.original_backup_dir()),
            naming: SnapshotNaming::Target,
        }
    }

    pub fn for_overlay(layout: &InstallLayout) -> Self {
        Self {
            dir: layout.overlay_active_dir(),
            original_dir: None,
            naming: SnapshotNaming::Overlay,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Picks the per-attempt backup path without touching the filesystem.
    pub fn plan(&self, layout: &InstallLayout, attempt_id: &str) -> PathBuf {
        let candidate = |id: &str| match self.naming {
            SnapshotNaming::Target => layout.attempt_backup_dir(id),
            SnapshotNaming::Overlay => layout.overlay_backup_dir(id),
        };

        let mut path = candidate(attempt_id);
        let mut suffix = 1_u32;
        while path.exists() {
            path = candidate(&format!("{attempt_id}-{suffix}"));
            suffix += 1;
        }
        path
    }

    pub fn backup(&self, backup_dir: &Path) -> Result<BackupSnapshot, InstallError> {
        if !self.dir.exists() {
            debug!(dir = %self.dir.display(), "nothing to back up");
            return Ok(BackupSnapshot::noop(&self.dir, backup_dir));
        }

        let mut created_original = None;
        if let Some(original) = &self.original_dir {
            if !original.exists() {
                info!(
                    from = %self.dir.display(),
                    to = %original.display(),
                    "preserving pristine tree"
                );
                copy_dir_atomic(&self.dir, original)?;
                created_original = Some(original.clone());
            }
        }

        if let Err(err) = move_dir(&self.dir, backup_dir) {
            if let Some(original) = &created_original {
                if let Err(cleanup) = remove_dir_if_exists(original) {
                    warn!(
                        path = %original.display(),
                        error = %cleanup,
                        "failed to discard pristine copy after backup failure"
                    );
                }
            }
            return Err(err);
        }

        info!(
            dir = %self.dir.display(),
            backup = %backup_dir.display(),
            "snapshot taken"
        );
        Ok(BackupSnapshot {
            dir: self.dir.clone(),
            backup_dir: backup_dir.to_path_buf(),
            taken: true,
            was_absent: false,
            created_original,
        })
    }
}

/// A renamed-aside directory. Consumed by exactly one of
/// [`BackupSnapshot::commit`] or [`BackupSnapshot::rollback`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a snapshot must be committed or rolled back"]
pub struct BackupSnapshot {
    dir: PathBuf,
    backup_dir: PathBuf,
    taken: bool,
    /// The directory did not exist when the snapshot was taken, so whatever
    /// appears there later belongs to the attempt.
    was_absent: bool,
    created_original: Option<PathBuf>,
}

impl BackupSnapshot {
    fn noop(dir: &Path, backup_dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            taken: false,
            was_absent: true,
            created_original: None,
        }
    }

    /// Rebuilds a snapshot from paths recorded before a crash.
    pub(crate) fn resume(
        dir: PathBuf,
        backup_dir: PathBuf,
        dir_existed: bool,
        created_original: Option<PathBuf>,
    ) -> Self {
        let taken = dir_existed && backup_dir.exists();
        Self {
            dir,
            backup_dir,
            taken,
            was_absent: !dir_existed,
            created_original,
        }
    }

    pub fn is_taken(&self) -> bool {
        self.taken
    }

    pub fn was_absent(&self) -> bool {
        self.was_absent
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn created_original(&self) -> Option<&Path> {
        self.created_original.as_deref()
    }

    /// Discards the backup. Failures are logged and never surfaced.
    pub fn commit(self) {
        if !self.taken {
            return;
        }
        match remove_dir_if_exists(&self.backup_dir) {
            Ok(()) => debug!(backup = %self.backup_dir.display(), "snapshot discarded"),
            Err(err) => warn!(
                backup = %self.backup_dir.display(),
                error = %err,
                "failed to remove spent snapshot"
            ),
        }
    }

    /// Puts the backup back in place of whatever now occupies the directory.
    pub fn rollback(self) -> Result<(), InstallError> {
        if self.was_absent {
            remove_dir_if_exists(&self.dir)?;
            debug!(dir = %self.dir.display(), "removed directory created by attempt");
            return Ok(());
        }
        if !self.taken {
            // A pristine copy made right before an interrupted rename is a
            // duplicate of the still-present directory.
            if let Some(original) = &self.created_original {
                if self.dir.exists() {
                    remove_dir_if_exists(original)?;
                }
            }
            return Ok(());
        }
        if !self.backup_dir.exists() {
            warn!(
                backup = %self.backup_dir.display(),
                "snapshot directory is gone; nothing to restore"
            );
            return Ok(());
        }

        remove_dir_if_exists(&self.dir)?;
        move_dir(&self.backup_dir, &self.dir)?;
        if let Some(original) = &self.created_original {
            remove_dir_if_exists(original)?;
        }
        info!(dir = %self.dir.display(), "snapshot restored");
        Ok(())
    }
}
