use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::InstallError;

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<(), InstallError> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|err| InstallError::io(path, "remove", err))
}

pub(crate) fn create_parent_dir(path: &Path) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| InstallError::io(parent, "create", err))?;
    }
    Ok(())
}

pub(crate) fn move_dir(src: &Path, dst: &Path) -> Result<(), InstallError> {
    create_parent_dir(dst)?;
    fs::rename(src, dst).map_err(|err| {
        if crate::error::is_locked_error(&err) {
            return InstallError::DirectoryLocked {
                path: src.to_path_buf(),
                source: err,
            };
        }
        InstallError::RenameFailed {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: err,
        }
    })
}

/// Moves `src` to `dst`, falling back to copy + delete when a plain rename
/// is not possible (for example across filesystems).
pub(crate) fn move_dir_or_copy(src: &Path, dst: &Path) -> Result<(), InstallError> {
    create_parent_dir(dst)?;

    match fs::rename(src, dst) {
        Ok(_) => Ok(()),
        Err(err) if crate::error::is_locked_error(&err) => Err(InstallError::DirectoryLocked {
            path: src.to_path_buf(),
            source: err,
        }),
        Err(_) => {
            copy_dir_recursive(src, dst)?;
            fs::remove_dir_all(src).map_err(|err| InstallError::io(src, "clean up", err))
        }
    }
}

/// Copies into a sibling scratch directory first so `dst` only ever appears
/// complete.
pub(crate) fn copy_dir_atomic(src: &Path, dst: &Path) -> Result<(), InstallError> {
    let partial = partial_copy_path(dst);

    remove_dir_if_exists(&partial)?;
    if let Err(err) = copy_dir_recursive(src, &partial) {
        let _ = fs::remove_dir_all(&partial);
        return Err(err);
    }
    move_dir(&partial, dst)
}

/// Scratch sibling `copy_dir_atomic` fills before renaming it onto `dst`.
pub(crate) fn partial_copy_path(dst: &Path) -> PathBuf {
    let mut partial = dst.as_os_str().to_os_string();
    partial.push(".partial");
    PathBuf::from(partial)
}

pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(dst).map_err(|err| InstallError::io(dst, "create", err))?;
    let entries = fs::read_dir(src).map_err(|err| InstallError::io(src, "read", err))?;
    for entry in entries {
        let entry = entry.map_err(|err| InstallError::io(src, "read", err))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .map_err(|err| InstallError::io(&src_path, "stat", err))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }

        #[cfg(unix)]
        if metadata.file_type().is_symlink() {
            let target = fs::read_link(&src_path)
                .map_err(|err| InstallError::io(&src_path, "read symlink", err))?;
            std::os::unix::fs::symlink(&target, &dst_path)
                .map_err(|err| InstallError::io(&dst_path, "create symlink", err))?;
            continue;
        }

        fs::copy(&src_path, &dst_path).map_err(|err| InstallError::io(&dst_path, "copy", err))?;
    }
    Ok(())
}
