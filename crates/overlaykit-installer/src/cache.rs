use std::path::{Path, PathBuf};

use overlaykit_core::{ArtifactKind, ArtifactSources, OverlayConfig, VersionDescriptor};

use crate::{InstallError, InstallLayout};

/// Resolves a requested artifact to a local archive.
///
/// Fetching and tag resolution live behind this trait; the install pipeline
/// only asks where an archive is and which folder inside it holds content.
pub trait ArtifactCache {
    fn archive_path(
        &self,
        kind: ArtifactKind,
        descriptor: &VersionDescriptor,
    ) -> Result<PathBuf, InstallError>;

    fn inner_folder(
        &self,
        kind: ArtifactKind,
        descriptor: &VersionDescriptor,
    ) -> Result<String, InstallError>;

    fn cache_dir(&self) -> &Path;
}

/// Archives already present under `<cache_dir>/<kind>/`, named by the
/// configured templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifactCache {
    cache_dir: PathBuf,
    sources: ArtifactSources,
}

impl LocalArtifactCache {
    pub fn new(cache_dir: impl Into<PathBuf>, sources: ArtifactSources) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            sources,
        }
    }

    pub fn from_config(config: &OverlayConfig, layout: &InstallLayout) -> Self {
        Self::new(layout.cache_dir(), config.artifacts.clone())
    }

    pub fn set_cache_dir(&mut self, cache_dir: impl Into<PathBuf>) {
        self.cache_dir = cache_dir.into();
    }

    pub fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.cache_dir.join(kind.as_str())
    }

    fn expected_archive_path(&self, kind: ArtifactKind, descriptor: &VersionDescriptor) -> PathBuf {
        let spec = descriptor.artifact(kind);
        self.kind_dir(kind)
            .join(self.sources.get(kind).archive_file_name(spec))
    }
}

impl ArtifactCache for LocalArtifactCache {
    fn archive_path(
        &self,
        kind: ArtifactKind,
        descriptor: &VersionDescriptor,
    ) -> Result<PathBuf, InstallError> {
        let path = self.expected_archive_path(kind, descriptor);
        if !path.is_file() {
            return Err(InstallError::ArtifactUnavailable {
                kind,
                reason: format!("archive not found in cache: {}", path.display()),
            });
        }
        Ok(path)
    }

    fn inner_folder(
        &self,
        kind: ArtifactKind,
        descriptor: &VersionDescriptor,
    ) -> Result<String, InstallError> {
        Ok(self
            .sources
            .get(kind)
            .inner_folder(descriptor.artifact(kind)))
    }

    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Archives unpack next to themselves: `dir/name.zip` → `dir/name/`.
pub fn extraction_dir(archive_path: &Path) -> PathBuf {
    let stem = archive_path
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| "extracted".into());
    archive_path
        .parent()
        .map(|parent| parent.join(&stem))
        .unwrap_or_else(|| PathBuf::from(stem))
}
