mod artifact;
mod config;
mod version;

pub use artifact::{ArtifactKind, ArtifactSpec, VersionDescriptor};
pub use config::{
    ArtifactSource, ArtifactSources, HelperSeed, OverlayConfig, DEFAULT_CONFIG_FILE_NAME,
};
pub use version::InstalledVersionRecord;

#[cfg(test)]
mod tests;
