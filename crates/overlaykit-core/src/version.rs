use serde::{Deserialize, Serialize};

use crate::artifact::VersionDescriptor;

/// What is currently installed for one target project.
///
/// The default value means "never installed": every tag is empty and the
/// timestamp is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct InstalledVersionRecord {
    pub base_tag: String,
    pub overlay_tag: String,
    pub install_time_text: String,
    pub install_timestamp_millis: i64,
    pub cache_dir: String,
}

impl InstalledVersionRecord {
    pub fn is_installed(&self) -> bool {
        !self.base_tag.is_empty() || !self.overlay_tag.is_empty()
    }

    pub fn matches(&self, descriptor: &VersionDescriptor) -> bool {
        self.base_tag == descriptor.base.tag && self.overlay_tag == descriptor.overlay.tag
    }

    pub fn clear_tags(&mut self) {
        self.base_tag.clear();
        self.overlay_tag.clear();
    }
}
