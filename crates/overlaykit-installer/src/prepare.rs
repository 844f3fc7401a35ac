use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::fs_utils::copy_dir_atomic;
use crate::{InstallError, InstallLayout};

/// Creates the helper root and copies each configured host subtree into it
/// once. Returns the seed directories created by this call.
pub fn prepare_helper_root(layout: &InstallLayout) -> Result<Vec<PathBuf>, InstallError> {
    let root = layout.helper_root();
    fs::create_dir_all(root).map_err(|err| InstallError::io(root, "create", err))?;

    let mut seeded = Vec::new();
    for seed in layout.seeds() {
        let dst = layout.seed_dir(&seed.name);
        if dst.exists() {
            debug!(seed = %seed.name, "seed already present");
            continue;
        }
        if !seed.source.is_dir() {
            return Err(InstallError::MissingPrerequisiteDirectory {
                path: seed.source.clone(),
            });
        }

        info!(
            seed = %seed.name,
            from = %seed.source.display(),
            "seeding helper root"
        );
        copy_dir_atomic(&seed.source, &dst)?;
        seeded.push(dst);
    }
    Ok(seeded)
}

/// Confirms the installed tree is where builds expect it, reporting the
/// first missing directory.
pub fn check_installation(layout: &InstallLayout) -> Result<(), InstallError> {
    for path in [
        layout.helper_runtime_dir(),
        layout.overlay_active_dir(),
        layout.overlay_install_dir(),
    ] {
        if !path.is_dir() {
            return Err(InstallError::MissingPrerequisiteDirectory { path });
        }
    }
    Ok(())
}
