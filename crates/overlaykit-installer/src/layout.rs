use std::path::{Path, PathBuf};

use overlaykit_core::{HelperSeed, OverlayConfig};

const STATE_DIR_NAME: &str = ".overlaykit";
const VERSION_FILE_NAME: &str = "version.json";

/// Every path the installer touches, derived from the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    runtime_dir: PathBuf,
    target_name: String,
    helper_root: PathBuf,
    overlay_subdir: String,
    version_file: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    seeds: Vec<HelperSeed>,
}

impl InstallLayout {
    pub fn new(runtime_dir: impl Into<PathBuf>, helper_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            target_name: "libil2cpp".to_string(),
            helper_root: helper_root.into(),
            overlay_subdir: "huatuo".to_string(),
            version_file: None,
            cache_dir: None,
            seeds: Vec::new(),
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            runtime_dir: config.runtime_dir.clone(),
            target_name: config.target_name.clone(),
            helper_root: config.helper_root.clone(),
            overlay_subdir: config.overlay_subdir.clone(),
            version_file: config.version_file.clone(),
            cache_dir: config.cache_dir.clone(),
            seeds: config.seeds.clone(),
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<HelperSeed>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_version_file(mut self, version_file: impl Into<PathBuf>) -> Self {
        self.version_file = Some(version_file.into());
        self
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn helper_root(&self) -> &Path {
        &self.helper_root
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn overlay_subdir(&self) -> &str {
        &self.overlay_subdir
    }

    pub fn seeds(&self) -> &[HelperSeed] {
        &self.seeds
    }

    pub fn target_dir(&self) -> PathBuf {
        self.runtime_dir.join(&self.target_name)
    }

    pub fn original_backup_dir(&self) -> PathBuf {
        self.runtime_dir
            .join(format!("{}_original", self.target_name))
    }

    pub fn attempt_backup_dir(&self, attempt_id: &str) -> PathBuf {
        self.runtime_dir
            .join(format!("{}_{attempt_id}", self.target_name))
    }

    pub fn helper_runtime_dir(&self) -> PathBuf {
        let name = self
            .runtime_dir
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "runtime".into());
        self.helper_root.join(name)
    }

    /// The installed base tree; the overlay lives inside it.
    pub fn overlay_active_dir(&self) -> PathBuf {
        self.helper_runtime_dir().join(&self.target_name)
    }

    pub fn overlay_install_dir(&self) -> PathBuf {
        self.overlay_active_dir().join(&self.overlay_subdir)
    }

    pub fn overlay_disabled_dir(&self) -> PathBuf {
        self.helper_runtime_dir()
            .join(format!("{}_disabled", self.target_name))
    }

    pub fn overlay_backup_dir(&self, attempt_id: &str) -> PathBuf {
        self.helper_runtime_dir()
            .join(format!("{}_{attempt_id}", self.target_name))
    }

    pub fn seed_dir(&self, name: &str) -> PathBuf {
        self.helper_root.join(name)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.helper_root.join(STATE_DIR_NAME)
    }

    pub fn transaction_active_path(&self) -> PathBuf {
        self.state_dir().join("install.active")
    }

    pub fn staging_dir(&self, attempt_id: &str) -> PathBuf {
        self.state_dir().join("staging").join(attempt_id)
    }

    pub fn version_file(&self) -> PathBuf {
        self.version_file
            .clone()
            .unwrap_or_else(|| self.helper_root.join(VERSION_FILE_NAME))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.helper_root.join("cache"))
    }
}
