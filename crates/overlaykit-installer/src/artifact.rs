use std::path::{Path, PathBuf};

use overlaykit_core::ArtifactKind;
use tracing::{debug, info};

use crate::fs_utils::{copy_dir_recursive, move_dir_or_copy, remove_dir_if_exists};
use crate::{InstallError, InstallLayout};

/// Content folders located inside the two extracted archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifacts {
    pub base_dir: PathBuf,
    pub overlay_dir: PathBuf,
}

impl ExtractedArtifacts {
    pub fn dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Base => &self.base_dir,
            ArtifactKind::Overlay => &self.overlay_dir,
        }
    }

    pub fn ensure_present(&self) -> Result<(), InstallError> {
        for kind in ArtifactKind::ALL {
            let dir = self.dir(kind);
            if !dir.is_dir() {
                return Err(InstallError::MissingExtractedArtifact {
                    kind,
                    path: dir.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// Places the base tree at the active overlay location with the overlay tree
/// inside it, and clears the host target directory.
///
/// The combined tree is assembled under `staging_dir` first and only moved
/// into place once both copies have succeeded.
pub fn install_artifacts(
    layout: &InstallLayout,
    extracted: &ExtractedArtifacts,
    staging_dir: &Path,
) -> Result<PathBuf, InstallError> {
    extracted.ensure_present()?;

    let target = layout.target_dir();
    if target.exists() {
        debug!(target = %target.display(), "removing target directory");
        remove_dir_if_exists(&target)?;
    }

    remove_dir_if_exists(staging_dir)?;
    copy_dir_recursive(&extracted.base_dir, staging_dir)?;

    let staged_overlay = staging_dir.join(layout.overlay_subdir());
    remove_dir_if_exists(&staged_overlay)?;
    copy_dir_recursive(&extracted.overlay_dir, &staged_overlay)?;

    let dst = layout.overlay_active_dir();
    remove_dir_if_exists(&dst)?;
    move_dir_or_copy(staging_dir, &dst)?;

    info!(dst = %dst.display(), "artifacts installed");
    Ok(dst)
}
