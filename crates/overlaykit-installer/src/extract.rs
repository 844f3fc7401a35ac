use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractProgress {
    pub completed: u64,
    pub total: u64,
}

impl ExtractProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Lazily unpacks a zip archive, one entry per call to `next`.
///
/// Nothing happens until the first item is pulled. The archive is opened
/// then, so `total` is only meaningful from the first tick on. Any failure
/// is yielded once as `Err` and ends the sequence.
pub struct ZipExtraction {
    archive_path: PathBuf,
    dest: PathBuf,
    state: ExtractionState,
}

enum ExtractionState {
    Pending,
    Running {
        archive: ZipArchive<BufReader<File>>,
        next: usize,
    },
    Finished,
}

pub fn extract_zip(archive_path: &Path, dest: &Path) -> ZipExtraction {
    ZipExtraction {
        archive_path: archive_path.to_path_buf(),
        dest: dest.to_path_buf(),
        state: ExtractionState::Pending,
    }
}

impl ZipExtraction {
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    fn open(&self) -> Result<ZipArchive<BufReader<File>>, InstallError> {
        let file = File::open(&self.archive_path).map_err(|err| self.failure(err))?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|err| self.failure(err))?;
        fs::create_dir_all(&self.dest).map_err(|err| InstallError::io(&self.dest, "create", err))?;
        debug!(
            archive = %self.archive_path.display(),
            entries = archive.len(),
            "archive opened"
        );
        Ok(archive)
    }

    fn failure(&self, reason: impl std::fmt::Display) -> InstallError {
        InstallError::ArchiveExtractionFailed {
            archive: self.archive_path.clone(),
            reason: reason.to_string(),
        }
    }

    fn extract_entry(
        &self,
        archive: &mut ZipArchive<BufReader<File>>,
        index: usize,
    ) -> Result<(), InstallError> {
        let mut entry = archive.by_index(index).map_err(|err| self.failure(err))?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(self.failure(format!(
                "entry '{}' escapes the destination directory",
                entry.name()
            )));
        };
        let out_path = self.dest.join(&rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|err| InstallError::io(&out_path, "create", err))?;
            return Ok(());
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|err| InstallError::io(parent, "create", err))?;
        }

        if entry.is_symlink() {
            let mut link = String::new();
            entry
                .read_to_string(&mut link)
                .map_err(|err| self.failure(err))?;
            if !link_stays_inside(&rel_path, Path::new(&link)) {
                return Err(self.failure(format!(
                    "symlink '{}' points outside the destination directory",
                    entry.name()
                )));
            }
            return self.create_symlink(Path::new(&link), &out_path);
        }

        let mut out_file =
            File::create(&out_path).map_err(|err| InstallError::io(&out_path, "create", err))?;
        io::copy(&mut entry, &mut out_file).map_err(|err| self.failure(err))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|err| InstallError::io(&out_path, "set permissions on", err))?;
        }

        Ok(())
    }

    #[cfg(unix)]
    fn create_symlink(&self, link: &Path, out_path: &Path) -> Result<(), InstallError> {
        std::os::unix::fs::symlink(link, out_path)
            .map_err(|err| InstallError::io(out_path, "create symlink", err))
    }

    #[cfg(not(unix))]
    fn create_symlink(&self, _link: &Path, out_path: &Path) -> Result<(), InstallError> {
        Err(self.failure(format!(
            "symlink entry '{}' is not supported on this platform",
            out_path.display()
        )))
    }
}

/// Resolves `link` lexically from the directory holding `entry_path`; false
/// once it climbs above the extraction root or is absolute.
fn link_stays_inside(entry_path: &Path, link: &Path) -> bool {
    let mut depth = entry_path.components().count().saturating_sub(1);
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(parent) => depth = parent,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

impl Iterator for ZipExtraction {
    type Item = Result<ExtractProgress, InstallError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ExtractionState::Pending) {
            match self.open() {
                Ok(archive) => self.state = ExtractionState::Running { archive, next: 0 },
                Err(err) => {
                    self.state = ExtractionState::Finished;
                    return Some(Err(err));
                }
            }
        }

        let ExtractionState::Running { mut archive, next } =
            std::mem::replace(&mut self.state, ExtractionState::Finished)
        else {
            return None;
        };

        let total = archive.len();
        if next >= total {
            return None;
        }

        if let Err(err) = self.extract_entry(&mut archive, next) {
            return Some(Err(err));
        }

        self.state = ExtractionState::Running {
            archive,
            next: next + 1,
        };
        Some(Ok(ExtractProgress {
            completed: (next + 1) as u64,
            total: total as u64,
        }))
    }
}
