use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, ArtifactSpec};

pub const DEFAULT_CONFIG_FILE_NAME: &str = "overlaykit.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Host runtime root that holds the target directory.
    pub runtime_dir: PathBuf,
    #[serde(default = "default_target_name")]
    pub target_name: String,
    /// Tool-owned directory that receives the installed tree and seeded
    /// host subtrees.
    pub helper_root: PathBuf,
    #[serde(default = "default_overlay_subdir")]
    pub overlay_subdir: String,
    pub version_file: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<HelperSeed>,
    #[serde(default)]
    pub artifacts: ArtifactSources,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelperSeed {
    pub name: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSources {
    #[serde(default = "ArtifactSource::default_base")]
    pub base: ArtifactSource,
    #[serde(default = "ArtifactSource::default_overlay")]
    pub overlay: ArtifactSource,
}

impl Default for ArtifactSources {
    fn default() -> Self {
        Self {
            base: ArtifactSource::default_base(),
            overlay: ArtifactSource::default_overlay(),
        }
    }
}

impl ArtifactSources {
    pub fn get(&self, kind: ArtifactKind) -> &ArtifactSource {
        match kind {
            ArtifactKind::Base => &self.base,
            ArtifactKind::Overlay => &self.overlay,
        }
    }
}

/// Naming templates for one artifact kind. `{tag}` and `{source}` are
/// substituted from the requested [`ArtifactSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSource {
    pub source: String,
    #[serde(default = "default_archive_template")]
    pub archive: String,
    #[serde(default = "default_inner_folder_template")]
    pub inner_folder: String,
}

impl ArtifactSource {
    fn default_base() -> Self {
        Self::with_source("base")
    }

    fn default_overlay() -> Self {
        Self::with_source("overlay")
    }

    fn with_source(source: &str) -> Self {
        Self {
            source: source.to_string(),
            archive: default_archive_template(),
            inner_folder: default_inner_folder_template(),
        }
    }

    pub fn archive_file_name(&self, spec: &ArtifactSpec) -> String {
        render_template(&self.archive, spec)
    }

    pub fn inner_folder(&self, spec: &ArtifactSpec) -> String {
        render_template(&self.inner_folder, spec)
    }
}

impl OverlayConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse overlaykit config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file; relative paths inside it resolve against the
    /// directory containing the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.runtime_dir);
        resolve(&mut self.helper_root);
        if let Some(version_file) = self.version_file.as_mut() {
            resolve(version_file);
        }
        if let Some(cache_dir) = self.cache_dir.as_mut() {
            resolve(cache_dir);
        }
        for seed in &mut self.seeds {
            resolve(&mut seed.source);
        }
    }

    pub fn source_for(&self, kind: ArtifactKind) -> &str {
        &self.artifacts.get(kind).source
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_plain_name("target_name", &self.target_name)?;
        validate_relative_subdir("overlay_subdir", &self.overlay_subdir)?;
        for seed in &self.seeds {
            validate_plain_name("seed name", &seed.name)?;
        }
        for kind in ArtifactKind::ALL {
            let source = self.artifacts.get(kind);
            if source.source.trim().is_empty() {
                return Err(anyhow!(
                    "artifacts.{}.source must not be empty",
                    kind.as_str()
                ));
            }
            if source.archive.trim().is_empty() {
                return Err(anyhow!(
                    "artifacts.{}.archive must not be empty",
                    kind.as_str()
                ));
            }
        }
        if self.helper_root.starts_with(self.runtime_dir.join(&self.target_name)) {
            return Err(anyhow!(
                "helper_root must not live inside the target directory: {}",
                self.helper_root.display()
            ));
        }
        Ok(())
    }
}

fn default_target_name() -> String {
    "libil2cpp".to_string()
}

fn default_overlay_subdir() -> String {
    "huatuo".to_string()
}

fn default_archive_template() -> String {
    "{source}-{tag}.zip".to_string()
}

fn default_inner_folder_template() -> String {
    "{source}-{tag}".to_string()
}

fn render_template(template: &str, spec: &ArtifactSpec) -> String {
    template
        .replace("{tag}", &spec.tag)
        .replace("{source}", &spec.source)
}

fn validate_plain_name(field: &str, value: &str) -> anyhow::Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{field} must not be empty"));
    }
    if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(anyhow!("{field} must be a plain directory name: {value}"));
    }
    Ok(())
}

fn validate_relative_subdir(field: &str, value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must not be empty"));
    }
    let path = Path::new(value);
    if path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(anyhow!("{field} must be a relative path without '..': {value}"));
    }
    Ok(())
}
