use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use overlaykit_core::InstalledVersionRecord;
use tracing::{debug, error, info};

use crate::fs_utils::create_parent_dir;
use crate::{InstallError, InstallLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// Installed tree active; any host target parked in the original slot.
    Enabled,
    /// Installed tree parked in the disabled slot; any host target back in place.
    Disabled,
    NotInstalled,
    Inconsistent,
}

impl OverlayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::NotInstalled => "not-installed",
            Self::Inconsistent => "inconsistent",
        }
    }
}

/// Classifies the tree from directory presence. Without installed tags in
/// `record` the helper tree holds at most seeded host content, so nothing
/// counts as installed.
pub fn overlay_state(layout: &InstallLayout, record: &InstalledVersionRecord) -> OverlayState {
    if !record.is_installed() {
        return OverlayState::NotInstalled;
    }

    let target = layout.target_dir().exists();
    let active = layout.overlay_active_dir().exists();
    let disabled = layout.overlay_disabled_dir().exists();

    match (target, active, disabled) {
        (false, true, false) => OverlayState::Enabled,
        (true, false, true) => OverlayState::Disabled,
        (false, false, true) if !layout.original_backup_dir().exists() => OverlayState::Disabled,
        (true, false, false) => OverlayState::NotInstalled,
        _ => OverlayState::Inconsistent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    AlreadyInPlace,
}

/// Renames `from` to `to`. A missing source whose destination already exists
/// counts as done; an occupied destination is never overwritten.
pub fn rename_dir(from: &Path, to: &Path) -> Result<RenameOutcome, InstallError> {
    let source_exists = from.exists();
    let dest_exists = to.exists();
    let refused = |kind: io::ErrorKind, message: &str| InstallError::RenameFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: io::Error::new(kind, message.to_string()),
    };

    match (source_exists, dest_exists) {
        (false, true) => {
            debug!(to = %to.display(), "rename already applied");
            return Ok(RenameOutcome::AlreadyInPlace);
        }
        (false, false) => {
            return Err(refused(
                io::ErrorKind::NotFound,
                "neither source nor destination exists",
            ))
        }
        (true, true) => {
            return Err(refused(
                io::ErrorKind::AlreadyExists,
                "destination already exists",
            ))
        }
        (true, false) => {}
    }

    create_parent_dir(to)?;
    fs::rename(from, to).map_err(|source| InstallError::RenameFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(RenameOutcome::Renamed)
}

/// Parks the host target in the original slot and activates the installed
/// overlay. Stops at the first failed rename without undoing the first.
///
/// A project that had no host target when the overlay was installed has
/// neither a target nor an original; only the overlay moves then.
pub fn enable(layout: &InstallLayout) -> Result<(), InstallError> {
    let mut moves = Vec::with_capacity(2);
    if has_host_target(layout) {
        moves.push((layout.target_dir(), layout.original_backup_dir()));
    }
    moves.push((layout.overlay_disabled_dir(), layout.overlay_active_dir()));
    rename_all("enable", &moves)
}

/// Parks the installed overlay and puts the pristine host target back.
pub fn disable(layout: &InstallLayout) -> Result<(), InstallError> {
    let mut moves = vec![(layout.overlay_active_dir(), layout.overlay_disabled_dir())];
    if has_host_target(layout) {
        moves.push((layout.original_backup_dir(), layout.target_dir()));
    }
    rename_all("disable", &moves)
}

fn has_host_target(layout: &InstallLayout) -> bool {
    layout.target_dir().exists() || layout.original_backup_dir().exists()
}

fn rename_all(operation: &str, moves: &[(PathBuf, PathBuf)]) -> Result<(), InstallError> {
    for (from, to) in moves {
        if let Err(err) = rename_dir(from, to) {
            error!(operation, error = %err, "toggle rename failed");
            return Err(err);
        }
    }
    info!(operation, "overlay toggled");
    Ok(())
}
