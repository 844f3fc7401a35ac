use tracing::info;

use crate::fs_utils::{move_dir, remove_dir_if_exists};
use crate::toggle::{disable, overlay_state, OverlayState};
use crate::{InstallError, InstallSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallStatus {
    NotInstalled,
    Uninstalled,
}

impl InstallSession {
    /// Disables the overlay, deletes the parked installed tree and forgets
    /// the installed tags. The recorded cache location is kept.
    pub fn uninstall(&mut self) -> Result<UninstallStatus, InstallError> {
        if !self.record.is_installed() {
            return Ok(UninstallStatus::NotInstalled);
        }
        let state = overlay_state(&self.layout, &self.record);
        if !matches!(state, OverlayState::Disabled | OverlayState::NotInstalled) {
            disable(&self.layout)?;
        }

        remove_dir_if_exists(&self.layout.overlay_disabled_dir())?;
        self.forget_installed_tags()?;
        info!("overlay uninstalled");
        Ok(UninstallStatus::Uninstalled)
    }

    /// Replaces the target directory with the pristine copy preserved by the
    /// first install, then forgets the installed tags.
    pub fn restore_original(&mut self) -> Result<(), InstallError> {
        let original = self.layout.original_backup_dir();
        if !original.exists() {
            return Err(InstallError::MissingPrerequisiteDirectory { path: original });
        }

        let target = self.layout.target_dir();
        remove_dir_if_exists(&target)?;
        move_dir(&original, &target)?;
        self.forget_installed_tags()?;
        info!(target = %target.display(), "pristine target restored");
        Ok(())
    }

    fn forget_installed_tags(&mut self) -> Result<(), InstallError> {
        let mut record = self.record.clone();
        record.clear_tags();
        self.store.save(&record)?;
        self.record = record;
        Ok(())
    }
}
